//! Catalogue entries, records and the candidate feed.
//!
//! The survey archive publishes a tabular index of every tile it holds. Parsing
//! that index is not this crate's business: the pipeline consumes a
//! [`CandidateFeed`], a finite, in-order stream of [`CatalogueEntry`] values.
//! Two feeds are provided:
//!
//! - [`JsonLinesFeed`] - one JSON object per line, as exported from the index
//! - [`MemoryFeed`] - a fixed list of entries, useful for tests and embedding
//!
//! Entries that pass the spatial filter for a region become [`Record`]s.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::region::{Point, Region};

/// One row of the archive's tile index.
///
/// Field aliases accept the upper-case column names used by the archive's
/// own index export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Archive block the tile belongs to (e.g. `b_35`).
    #[serde(alias = "BLOK")]
    pub block: String,

    /// Tile name, conventionally `<x km>_<y km>` (e.g. `462_101`).
    #[serde(alias = "NAME")]
    pub name: String,

    /// Tile center, easting.
    #[serde(alias = "CENTERX")]
    pub center_x: f64,

    /// Tile center, northing.
    #[serde(alias = "CENTERY")]
    pub center_y: f64,
}

impl CatalogueEntry {
    /// Creates a new entry.
    pub fn new(block: impl Into<String>, name: impl Into<String>, center_x: f64, center_y: f64) -> Self {
        Self {
            block: block.into(),
            name: name.into(),
            center_x,
            center_y,
        }
    }

    /// Returns the tile center as a point.
    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }
}

/// A catalogue entry paired with the region that selected it.
///
/// Records are immutable and shared (via `Arc`) by every task derived from
/// them.
#[derive(Debug, Clone)]
pub struct Record {
    entry: CatalogueEntry,
    region: Arc<Region>,
}

impl Record {
    /// Pairs an entry with a region.
    pub fn new(entry: CatalogueEntry, region: Arc<Region>) -> Self {
        Self { entry, region }
    }

    /// Returns the archive block identifier.
    pub fn block(&self) -> &str {
        &self.entry.block
    }

    /// Returns the tile name.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Returns the tile center.
    pub fn center(&self) -> Point {
        self.entry.center()
    }

    /// Returns the region this record was selected for.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the underlying catalogue entry.
    pub fn entry(&self) -> &CatalogueEntry {
        &self.entry
    }
}

/// Errors produced while reading a candidate feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed file could not be opened.
    #[error("failed to open feed {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading from the feed failed.
    #[error("failed to read feed at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    /// A line could not be decoded into an entry.
    #[error("malformed entry at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl FeedError {
    /// Returns true if the error only affects a single entry and the feed
    /// can continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FeedError::Malformed { .. })
    }
}

/// A finite, ordered stream of catalogue entries.
///
/// Returning `None` means end-of-stream: no further top-level work will
/// arrive, though the pipeline keeps draining what is already queued.
pub trait CandidateFeed: Send {
    /// Returns the next entry, an error for this position, or `None` at the end.
    fn next_entry(&mut self) -> Option<Result<CatalogueEntry, FeedError>>;
}

/// Feed reading one JSON object per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub struct JsonLinesFeed<R> {
    reader: R,
    line: usize,
    buffer: Vec<u8>,
}

impl JsonLinesFeed<BufReader<File>> {
    /// Opens a JSON-lines file.
    pub fn open(path: &Path) -> Result<Self, FeedError> {
        let file = File::open(path).map_err(|source| FeedError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> JsonLinesFeed<R> {
    /// Wraps any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: Vec::new(),
        }
    }
}

impl<R: BufRead + Send> CandidateFeed for JsonLinesFeed<R> {
    fn next_entry(&mut self) -> Option<Result<CatalogueEntry, FeedError>> {
        loop {
            self.buffer.clear();
            self.line += 1;

            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(FeedError::Read {
                        line: self.line,
                        source,
                    }))
                }
            }

            let text = match std::str::from_utf8(&self.buffer) {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(FeedError::Malformed {
                        line: self.line,
                        reason: e.to_string(),
                    }))
                }
            };

            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Some(serde_json::from_str(trimmed).map_err(|e| FeedError::Malformed {
                line: self.line,
                reason: e.to_string(),
            }));
        }
    }
}

/// Feed over a fixed list of entries.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    entries: VecDeque<CatalogueEntry>,
}

impl MemoryFeed {
    /// Creates a feed yielding `entries` in order.
    pub fn new(entries: impl IntoIterator<Item = CatalogueEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Returns the number of entries not yet yielded.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl CandidateFeed for MemoryFeed {
    fn next_entry(&mut self) -> Option<Result<CatalogueEntry, FeedError>> {
        self.entries.pop_front().map(Ok)
    }
}
