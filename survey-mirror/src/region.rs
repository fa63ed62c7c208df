//! Regions of interest and the spatial filter.
//!
//! A [`Region`] is a named bounding box in the survey's projected coordinate
//! system (metres). Regions are only used to decide which catalogue entries
//! are worth mirroring and to group log output; they are never mutated once
//! the configuration has been loaded.
//!
//! The filter itself sits behind the [`SpatialFilter`] trait so the pipeline
//! can be driven with a different acceptance rule in tests or by embedders.

use crate::catalogue::CatalogueEntry;

/// A point in projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A named, axis-aligned area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    min: Point,
    max: Point,
}

impl Region {
    /// Creates a region from its name and corner points.
    pub fn new(name: impl Into<String>, min: Point, max: Point) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    /// Returns the region's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the minimum (south-west) corner.
    pub fn min(&self) -> Point {
        self.min
    }

    /// Returns the maximum (north-east) corner.
    pub fn max(&self) -> Point {
        self.max
    }

    /// Returns true if `point` lies strictly inside the region grown by
    /// `margin` on every side.
    pub fn contains_expanded(&self, point: Point, margin: f64) -> bool {
        point.x > self.min.x - margin
            && point.x < self.max.x + margin
            && point.y > self.min.y - margin
            && point.y < self.max.y + margin
    }
}

/// Decides whether a catalogue entry is of interest for a region.
///
/// The pipeline calls this once per (entry, region) pair.
pub trait SpatialFilter: Send + Sync {
    /// Returns true if `entry` should be mirrored as part of `region`.
    fn accepts(&self, entry: &CatalogueEntry, region: &Region) -> bool;
}

/// Accepts entries whose center lies within the region expanded by a fixed
/// half-extent, so tiles straddling the region border are included.
#[derive(Debug, Clone, Copy)]
pub struct ExpandedBoundsFilter {
    half_extent: f64,
}

impl ExpandedBoundsFilter {
    /// Creates a filter for tiles of the given edge length.
    pub fn for_tile_size(tile_size: u32) -> Self {
        Self {
            half_extent: f64::from(tile_size) / 2.0,
        }
    }

    /// Returns the half-extent used to grow each region.
    pub fn half_extent(&self) -> f64 {
        self.half_extent
    }
}

impl SpatialFilter for ExpandedBoundsFilter {
    fn accepts(&self, entry: &CatalogueEntry, region: &Region) -> bool {
        region.contains_expanded(entry.center(), self.half_extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ljubljana() -> Region {
        Region::new(
            "Ljubljana",
            Point::new(457262.46, 96189.57),
            Point::new(467601.05, 106686.92),
        )
    }

    fn entry_at(x: f64, y: f64) -> CatalogueEntry {
        CatalogueEntry::new("b_35", "462_101", x, y)
    }

    #[test]
    fn test_center_inside_region_is_accepted() {
        let filter = ExpandedBoundsFilter::for_tile_size(1000);
        assert!(filter.accepts(&entry_at(462500.0, 101500.0), &ljubljana()));
    }

    #[test]
    fn test_center_within_half_extent_of_border_is_accepted() {
        let filter = ExpandedBoundsFilter::for_tile_size(1000);
        // 400 m west of the region edge, inside the 500 m margin
        assert!(filter.accepts(&entry_at(456862.46, 101500.0), &ljubljana()));
    }

    #[test]
    fn test_center_beyond_margin_is_rejected() {
        let filter = ExpandedBoundsFilter::for_tile_size(1000);
        assert!(!filter.accepts(&entry_at(456700.0, 101500.0), &ljubljana()));
        assert!(!filter.accepts(&entry_at(462500.0, 107200.0), &ljubljana()));
    }

    #[test]
    fn test_margin_boundary_is_exclusive() {
        let region = Region::new("unit", Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert!(!region.contains_expanded(Point::new(-5.0, 5.0), 5.0));
        assert!(region.contains_expanded(Point::new(-4.999, 5.0), 5.0));
    }

    #[test]
    fn test_half_extent() {
        assert_eq!(ExpandedBoundsFilter::for_tile_size(1000).half_extent(), 500.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_points_inside_region_always_accepted(
                x in 0.0..1000.0_f64,
                y in 0.0..1000.0_f64,
                margin in 0.0..500.0_f64,
            ) {
                let region = Region::new("box", Point::new(-0.5, -0.5), Point::new(1000.5, 1000.5));
                prop_assert!(region.contains_expanded(Point::new(x, y), margin));
            }

            #[test]
            fn test_points_far_outside_always_rejected(
                x in 2000.0..5000.0_f64,
                y in -5000.0..5000.0_f64,
                margin in 0.0..500.0_f64,
            ) {
                let region = Region::new("box", Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));
                prop_assert!(!region.contains_expanded(Point::new(x, y), margin));
            }
        }
    }
}
