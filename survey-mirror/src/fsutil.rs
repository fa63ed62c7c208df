//! Crash-safe write discipline.
//!
//! Nothing is ever written directly at a drain path. Producers write into a
//! `.part` sibling and the finished file is renamed into place, so a reader
//! either sees the complete artifact or nothing at all. Because the dedup
//! cache admits one task per drain, the derived temporary names are unique
//! per task.
//!
//! ```text
//! laz/b_35/TM_462_101.laz   ← drain
//! laz/b_35/TM_462_101.laz.part       ← temp_path()
//! laz/b_35/TM_462_101.part.laz       ← temp_path_keep_extension()
//! ```

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Suffix marking an in-progress file.
pub const PART_SUFFIX: &str = "part";

/// Returns `drain` with `.part` appended (`a/b.zlas` → `a/b.zlas.part`).
pub fn temp_path(drain: &Path) -> PathBuf {
    let mut name = drain
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".");
    name.push(PART_SUFFIX);
    drain.with_file_name(name)
}

/// Returns `drain` with `.part` inserted before the extension
/// (`a/b.laz` → `a/b.part.laz`).
///
/// External tools that derive companion files from the output extension
/// need the real extension kept last.
pub fn temp_path_keep_extension(drain: &Path) -> PathBuf {
    let stem = drain
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(OsString::new);
    let mut name = stem;
    name.push(".");
    name.push(PART_SUFFIX);
    if let Some(ext) = drain.extension() {
        name.push(".");
        name.push(ext);
    }
    drain.with_file_name(name)
}

/// Returns `path` with its extension replaced by `extension`.
pub fn sibling_with_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Returns the filesystem path behind a source location.
///
/// `file://` URLs and plain paths are local; any other scheme is remote and
/// yields `None`.
pub fn local_path(location: &str) -> Option<PathBuf> {
    if let Some(path) = location.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if location.contains("://") {
        return None;
    }
    Some(PathBuf::from(location))
}

/// Atomically moves a finished temporary file to its final path.
pub async fn commit(temp: &Path, drain: &Path) -> io::Result<()> {
    tokio::fs::rename(temp, drain).await?;
    debug!(drain = %drain.display(), "Committed");
    Ok(())
}

/// Removes a file if it exists, ignoring "not found".
///
/// Returns true if a file was removed. Other errors are logged and swallowed;
/// cleanup never turns a task failure into a run failure.
pub async fn remove_if_exists(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}

/// Returns true if `path` exists and is a regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
