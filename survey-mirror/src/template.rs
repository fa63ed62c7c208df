//! Render context and path templates.
//!
//! Every task derives a [`Params`] context once, from its record and the
//! configured tile size, and renders its recipe's `source` and `drain`
//! templates against it. Templates use `{key}` placeholders:
//!
//! | Key | Value |
//! |-----|-------|
//! | `block`, `name` | record identity |
//! | `region` | name of the selecting region |
//! | `center_x`, `center_y` | tile center |
//! | `min_x`, `min_y`, `max_x`, `max_y` | center ± half tile size |
//! | `width`, `height` | tile size |
//! | `tile_x`, `tile_y` | tile origin decoded from the name (`462_101` → `462000`, `101000`) |
//!
//! Configuration variables (`remote`, `local`, ...) are also available; the
//! record-derived keys above always take precedence.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::catalogue::Record;
use crate::region::Point;

/// Scale from the kilometre values in a tile name to metres.
pub const TILE_ORIGIN_SCALE: i64 = 1000;

/// Errors produced while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder names a key that is not in the context.
    #[error("unknown template key '{0}'")]
    UnknownKey(String),

    /// A `{` without a matching `}`.
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Axis-aligned bounds of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

/// Read-only render context derived from one record.
#[derive(Debug, Clone)]
pub struct Params {
    values: BTreeMap<String, String>,
    bounds: Bounds,
    tile_origin: Option<(i64, i64)>,
}

impl Params {
    /// Derives the context for `record`.
    ///
    /// # Arguments
    ///
    /// * `record` - The record being mirrored
    /// * `tile_size` - Tile edge length; bounds extend half of it around the center
    /// * `vars` - Configuration variables exposed to templates
    pub fn derive(record: &Record, tile_size: u32, vars: &BTreeMap<String, String>) -> Self {
        let half = f64::from(tile_size) / 2.0;
        let center = record.center();
        let bounds = Bounds {
            min: Point::new(center.x - half, center.y - half),
            max: Point::new(center.x + half, center.y + half),
        };
        let tile_origin = decode_tile_origin(record.name());

        let mut values = vars.clone();
        values.insert("block".into(), record.block().to_string());
        values.insert("name".into(), record.name().to_string());
        values.insert("region".into(), record.region().name().to_string());
        values.insert("center_x".into(), format_number(center.x));
        values.insert("center_y".into(), format_number(center.y));
        values.insert("min_x".into(), format_number(bounds.min.x));
        values.insert("min_y".into(), format_number(bounds.min.y));
        values.insert("max_x".into(), format_number(bounds.max.x));
        values.insert("max_y".into(), format_number(bounds.max.y));
        values.insert("width".into(), tile_size.to_string());
        values.insert("height".into(), tile_size.to_string());
        if let Some((x, y)) = tile_origin {
            values.insert("tile_x".into(), x.to_string());
            values.insert("tile_y".into(), y.to_string());
        } else {
            values.remove("tile_x");
            values.remove("tile_y");
        }

        Self {
            values,
            bounds,
            tile_origin,
        }
    }

    /// Looks up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the tile bounds.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Returns the tile origin decoded from the record name, if it decoded.
    pub fn tile_origin(&self) -> Option<(i64, i64)> {
        self.tile_origin
    }
}

fn tile_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Group 1: x in km, group 2: y in km. Trailing parts are ignored.
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)_(\d+)(?:_|$)").unwrap())
}

/// Decodes a tile name such as `462_101` into its origin in metres.
///
/// Returns `None` if the name does not start with two underscore-separated
/// integers.
pub fn decode_tile_origin(name: &str) -> Option<(i64, i64)> {
    let captures = tile_name_pattern().captures(name)?;
    let x = captures.get(1)?.as_str().parse::<i64>().ok()?;
    let y = captures.get(2)?.as_str().parse::<i64>().ok()?;
    Some((
        x.checked_mul(TILE_ORIGIN_SCALE)?,
        y.checked_mul(TILE_ORIGIN_SCALE)?,
    ))
}

/// Formats a coordinate without a trailing `.0` for whole numbers.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Turns a template and a context into a concrete path or URL.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` against `params`.
    fn render(&self, template: &str, params: &Params) -> Result<String, TemplateError>;
}

/// Renderer for `{key}` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, params: &Params) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or(TemplateError::Unterminated(offset + open))?;
            let key = after[..close].trim();
            let value = params
                .get(key)
                .ok_or_else(|| TemplateError::UnknownKey(key.to_string()))?;
            out.push_str(value);

            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);

        Ok(out)
    }
}
