//! Built-in configuration: the survey archive layout and areas of interest.

use crate::recipe::Operation;

use super::{RecipeSpec, RegionSpec};

/// Default remote archive root.
pub const DEFAULT_REMOTE: &str = "http://gis.arso.gov.si/";

/// Default root for final artifacts.
pub const DEFAULT_LOCAL: &str = "mirror/";

/// Default root for bulky intermediates.
pub const DEFAULT_MASS_STORAGE: &str = "mirror/";

/// Default liberation tool.
pub const DEFAULT_LIBERATION_TOOL: &str = "lasliberate";

/// Default tile edge length.
pub const DEFAULT_TILE_SIZE: u32 = 1000;

/// The three resource types of the reference deployment.
///
/// `zlas` and `dmr` only exist as inputs; they are nested under `laz` and
/// `bdmr`.
pub fn default_recipes() -> Vec<RecipeSpec> {
    vec![
        RecipeSpec {
            name: "laz".into(),
            source: "recipe:zlas".into(),
            drain: "{local}laz/gkot/{block}/D96TM/TM_{name}.laz".into(),
            operation: Operation::Liberate,
            delete_source: true,
        },
        RecipeSpec {
            name: "zlas".into(),
            source: "{remote}lidar/gkot/{block}/D96TM/TM_{name}.zlas".into(),
            drain: "{mass_storage}lidar/gkot/{block}/D96TM/TM_{name}.zlas".into(),
            operation: Operation::Transfer,
            delete_source: false,
        },
        RecipeSpec {
            name: "bdmr".into(),
            source: "recipe:dmr".into(),
            drain: "{local}bdmr/{block}/D96TM/TM1_{name}.bin".into(),
            operation: Operation::GridTransform,
            delete_source: false,
        },
        RecipeSpec {
            name: "dmr".into(),
            source: "{remote}lidar/dmr1/{block}/D96TM/TM1_{name}.asc".into(),
            drain: "{mass_storage}lidar/dmr1/{block}/D96TM/TM1_{name}.asc".into(),
            operation: Operation::Transfer,
            delete_source: false,
        },
        RecipeSpec {
            name: "map".into(),
            source: concat!(
                "{remote}arcgis/rest/services/opensource_dof84/MapServer/export",
                "?bbox={min_x},{min_y},{max_x},{max_y}",
                "&size={width},{height}",
                "&bboxSR=3794&imageSR=3794",
                "&format=png&f=image"
            )
            .into(),
            drain: "{local}dof84/{block}/{name}.png".into(),
            operation: Operation::Transfer,
            delete_source: false,
        },
    ]
}

/// Areas of interest, in national grid coordinates.
pub fn default_regions() -> Vec<RegionSpec> {
    [
        ("Ljubljana", (457262.46, 96189.57), (467601.05, 106686.92)),
        ("Črnuče", (462558.80, 104325.61), (467235.31, 108234.83)),
        ("Bled", (427984.52, 133178.09), (433977.33, 138449.91)),
        ("Kranj", (447247.90, 118731.50), (453928.63, 124922.75)),
        ("Šmarna gora", (454843.38, 104168.26), (461848.22, 113058.26)),
        ("Piran", (387600.49, 40519.20), (391324.50, 44931.13)),
        ("Piran & Portorož", (385000.00, 39000.00), (392000.00, 46000.00)),
        ("Triglav", (409844.18, 136916.37), (411717.43, 139003.93)),
        ("Bohinj", (407997.72, 124741.46), (416259.34, 130972.40)),
        ("Maribor", (539405.46, 149183.21), (560386.91, 164317.38)),
    ]
    .into_iter()
    .map(|(name, min, max)| RegionSpec {
        name: name.to_string(),
        min_x: min.0,
        min_y: min.1,
        max_x: max.0,
        max_y: max.1,
    })
    .collect()
}
