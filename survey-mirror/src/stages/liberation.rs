//! Liberation stage: decompress a proprietary point cloud with an external tool.
//!
//! The tool is invoked as `<tool> <source> <output>` with an argument vector,
//! never through a shell. It writes the primary output and a companion index
//! file beside it, named after the output with the index extension:
//!
//! ```text
//! TM_462_101.part.laz  ─rename─►  TM_462_101.laz
//! TM_462_101.part.lax  ─rename─►  TM_462_101.lax
//! ```
//!
//! The two renames are independent. The primary goes first; a crash between
//! them leaves the primary without its index.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::StageError;
use crate::fsutil;

/// Default extension of the index file.
pub const DEFAULT_INDEX_EXTENSION: &str = "lax";

/// External liberation tool.
#[derive(Debug, Clone)]
pub struct LiberationTool {
    program: PathBuf,
    index_extension: String,
}

impl LiberationTool {
    /// Creates a tool invoking `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            index_extension: DEFAULT_INDEX_EXTENSION.to_string(),
        }
    }

    /// Sets the index file extension (without the dot).
    pub fn with_index_extension(mut self, extension: impl Into<String>) -> Self {
        self.index_extension = extension.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn index_extension(&self) -> &str {
        &self.index_extension
    }

    /// Runs the tool, capturing its stderr.
    async fn run(&self, source: &Path, output: &Path) -> Result<(), StageError> {
        let result = Command::new(&self.program)
            .arg(source)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| StageError::ToolSpawn {
                tool: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(StageError::ToolFailed {
                tool: self.program.clone(),
                status: result.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    /// Liberates `source` into `drain`, committing the index file beside it.
    ///
    /// On failure every temporary output is removed and nothing appears at
    /// `drain`. A missing index after a successful run is only a warning.
    pub async fn liberate(&self, source: &str, drain: &Path) -> Result<(), StageError> {
        let source = fsutil::local_path(source).unwrap_or_else(|| PathBuf::from(source));
        let temp = fsutil::temp_path_keep_extension(drain);
        let index_temp = fsutil::sibling_with_extension(&temp, &self.index_extension);
        let index = fsutil::sibling_with_extension(drain, &self.index_extension);

        if let Err(e) = self.run(&source, &temp).await {
            fsutil::remove_if_exists(&temp).await;
            fsutil::remove_if_exists(&index_temp).await;
            return Err(e);
        }

        if let Err(e) = fsutil::commit(&temp, drain).await {
            fsutil::remove_if_exists(&temp).await;
            fsutil::remove_if_exists(&index_temp).await;
            return Err(StageError::Commit {
                path: drain.to_path_buf(),
                source: e,
            });
        }

        if let Err(e) = fsutil::commit(&index_temp, &index).await {
            warn!(index = %index.display(), error = %e, "Liberated output has no index");
        }

        debug!(drain = %drain.display(), "Liberation complete");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// `/bin/sh <script> <output>` stands in for the real tool.
    fn tool() -> LiberationTool {
        LiberationTool::new("/bin/sh")
    }

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("TM_462_101.zlas");
        std::fs::write(&path, body).unwrap();
        path
    }

    const WRITES_BOTH: &str = "printf laz > \"$1\"\nprintf lax > \"${1%.laz}.lax\"\n";

    #[tokio::test]
    async fn test_liberate_commits_output_and_index() {
        let dir = TempDir::new().unwrap();
        let source = script(&dir, WRITES_BOTH);
        let drain = dir.path().join("TM_462_101.laz");

        tool().liberate(source.to_str().unwrap(), &drain).await.unwrap();

        assert_eq!(std::fs::read(&drain).unwrap(), b"laz");
        assert_eq!(std::fs::read(dir.path().join("TM_462_101.lax")).unwrap(), b"lax");
        assert!(!dir.path().join("TM_462_101.part.laz").exists());
        assert!(!dir.path().join("TM_462_101.part.lax").exists());
    }

    #[tokio::test]
    async fn test_tool_failure_cleans_up() {
        let dir = TempDir::new().unwrap();
        let source = script(
            &dir,
            "printf partial > \"$1\"\necho 'corrupt zlas header' >&2\nexit 3\n",
        );
        let drain = dir.path().join("TM_462_101.laz");

        let err = tool().liberate(source.to_str().unwrap(), &drain).await.unwrap_err();

        match &err {
            StageError::ToolFailed { stderr, .. } => assert_eq!(stderr, "corrupt zlas header"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!drain.exists());
        assert!(!dir.path().join("TM_462_101.part.laz").exists());
        // The source is untouched.
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_missing_index_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let source = script(&dir, "printf laz > \"$1\"\n");
        let drain = dir.path().join("TM_462_101.laz");

        tool().liberate(source.to_str().unwrap(), &drain).await.unwrap();

        assert!(drain.exists());
        assert!(!dir.path().join("TM_462_101.lax").exists());
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let drain = dir.path().join("TM_462_101.laz");

        let err = LiberationTool::new("/nonexistent/lasliberate")
            .liberate("/m/TM_462_101.zlas", &drain)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::ToolSpawn { .. }));
        assert_eq!(err.kind(), "tool");
    }

    #[test]
    fn test_custom_index_extension() {
        let tool = LiberationTool::new("lasliberate").with_index_extension("idx");
        assert_eq!(tool.index_extension(), "idx");
        assert_eq!(tool.program(), Path::new("lasliberate"));
    }
}
