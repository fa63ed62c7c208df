//! Binary terrain grid encoder.
//!
//! Terrain model tiles arrive as ASCII point lists, one `x;y;z` row per
//! sample at 1 m spacing. The encoder places every sample on a fixed
//! 1001 × 1001 grid anchored at the tile origin and writes the heights as
//! little-endian `i32` centimetres, row-major, north row first:
//!
//! ```text
//! col = ceil(x) - origin_x
//! row = 1000 - (ceil(y) - origin_y)
//! cell[row * 1001 + col] = round(z * 100)
//! ```
//!
//! Cells without a sample stay 0. A sample outside the grid or a row that
//! does not parse rejects the whole tile.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Grid edge length in cells.
pub const GRID_SIZE: usize = 1001;

/// Bytes per encoded cell.
pub const CELL_BYTES: usize = 4;

/// Scale from metres to stored units.
const HEIGHT_SCALE: f64 = 100.0;

/// Errors reported by the encoder.
///
/// All of them describe bad input data; none indicate a fault in the pipeline.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("{} has invalid grid point at line {line}: {col}, {row}", path.display())]
    OutOfGrid {
        path: PathBuf,
        line: usize,
        col: i64,
        row: i64,
    },
}

/// One self-contained encode job.
#[derive(Debug, Clone)]
pub struct GridJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub origin: (i64, i64),
}

/// Result of a successful encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSummary {
    pub points: usize,
}

/// Maps a sample to its cell as `(col, row)`, unchecked.
///
/// Arithmetic saturates, so far-away samples map to far-away cells.
pub fn cell_of(x: f64, y: f64, origin: (i64, i64)) -> (i64, i64) {
    let col = (x.ceil() as i64).saturating_sub(origin.0);
    let row = (GRID_SIZE as i64 - 1).saturating_sub((y.ceil() as i64).saturating_sub(origin.1));
    (col, row)
}

/// Returns the flat cell index for a sample, or `None` outside the grid.
pub fn cell_index(x: f64, y: f64, origin: (i64, i64)) -> Option<usize> {
    let (col, row) = cell_of(x, y, origin);
    let size = GRID_SIZE as i64;
    if (0..size).contains(&col) && (0..size).contains(&row) {
        Some((row * size + col) as usize)
    } else {
        None
    }
}

/// Converts a height in metres to stored centimetres.
pub fn encode_height(z: f64) -> Option<i32> {
    let scaled = (z * HEIGHT_SCALE).round();
    if scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX) {
        Some(scaled as i32)
    } else {
        None
    }
}

/// Parses one `x;y;z` row. Extra columns are ignored.
fn parse_row(line: &str, number: usize) -> Result<(f64, f64, f64), GridError> {
    let mut fields = line.split(';').map(str::trim);
    let mut next = |axis: &str| -> Result<f64, GridError> {
        let field = fields.next().ok_or_else(|| GridError::InvalidRow {
            line: number,
            reason: format!("missing {} column", axis),
        })?;
        let value = field.parse::<f64>().map_err(|e| GridError::InvalidRow {
            line: number,
            reason: format!("bad {} value '{}': {}", axis, field, e),
        })?;
        if !value.is_finite() {
            return Err(GridError::InvalidRow {
                line: number,
                reason: format!("{} value '{}' is not finite", axis, field),
            });
        }
        Ok(value)
    };
    let x = next("x")?;
    let y = next("y")?;
    let z = next("z")?;
    Ok((x, y, z))
}

/// Reads `source` into a grid of cells.
pub fn read_grid(source: &Path, origin: (i64, i64)) -> Result<(Vec<i32>, usize), GridError> {
    let read_err = |source_err| GridError::Read {
        path: source.to_path_buf(),
        source: source_err,
    };
    let reader = BufReader::new(File::open(source).map_err(read_err)?);

    let mut cells = vec![0i32; GRID_SIZE * GRID_SIZE];
    let mut points = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| GridError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let (x, y, z) = parse_row(&line, number)?;
        let index = cell_index(x, y, origin).ok_or_else(|| {
            let (col, row) = cell_of(x, y, origin);
            GridError::OutOfGrid {
                path: source.to_path_buf(),
                line: number,
                col,
                row,
            }
        })?;
        cells[index] = encode_height(z).ok_or_else(|| GridError::InvalidRow {
            line: number,
            reason: format!("height {} out of range", z),
        })?;
        points += 1;
    }

    Ok((cells, points))
}

/// Writes cells as little-endian `i32`.
fn write_grid(output: &Path, cells: &[i32]) -> Result<(), GridError> {
    let write_err = |e| GridError::Write {
        path: output.to_path_buf(),
        source: e,
    };
    let mut writer = BufWriter::new(File::create(output).map_err(write_err)?);
    for cell in cells {
        writer.write_all(&cell.to_le_bytes()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;
    Ok(())
}

/// Runs a job: reads the point list and writes the grid to `job.output`.
///
/// On failure nothing is left at `job.output`.
pub fn encode_grid(job: &GridJob) -> Result<GridSummary, GridError> {
    let result = read_grid(&job.source, job.origin)
        .and_then(|(cells, points)| write_grid(&job.output, &cells).map(|()| points));

    match result {
        Ok(points) => Ok(GridSummary { points }),
        Err(e) => {
            let _ = std::fs::remove_file(&job.output);
            Err(e)
        }
    }
}
