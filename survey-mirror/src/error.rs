//! Error types for the mirroring pipeline.
//!
//! Two tiers of failure exist:
//!
//! - [`StageError`] - fatal for one task only. Every variant is turned into a
//!   log line at the stage boundary and the run continues.
//! - [`PipelineError`] - fatal for the run. Returned from
//!   [`Pipeline::run`](crate::pipeline::Pipeline::run) rather than risking a
//!   silently partial mirror.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::catalogue::FeedError;
use crate::template::TemplateError;

/// Failure of a single task at a stage boundary.
#[derive(Debug, Error)]
pub enum StageError {
    /// The task's source template could not be rendered.
    #[error("unable to source: {0}")]
    UnresolvedSource(#[source] TemplateError),

    /// Network or filesystem fetch failed.
    #[error("transport failure fetching {source_location}: {reason}")]
    Transport {
        source_location: String,
        reason: String,
    },

    /// The external tool could not be started.
    #[error("failed to start {}: {source}", tool.display())]
    ToolSpawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("{} exited with {status}: {stderr}", tool.display())]
    ToolFailed {
        tool: PathBuf,
        status: String,
        stderr: String,
    },

    /// The worker rejected the job's input data.
    #[error("worker error: {0}")]
    Worker(String),

    /// The worker pool dropped the job without reporting a result.
    #[error("worker pool lost the job")]
    WorkerLost,

    /// The worker pool could not be started.
    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),

    /// Moving a finished temporary file into place failed.
    #[error("failed to commit {}: {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A task this one depends on did not produce its output.
    #[error("dependency {0} was not produced")]
    DependencyFailed(String),
}

impl StageError {
    /// Creates a transport error.
    pub fn transport(source_location: impl Into<String>, reason: impl ToString) -> Self {
        StageError::Transport {
            source_location: source_location.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used in status lines and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::UnresolvedSource(_) => "unresolved",
            StageError::Transport { .. } => "transport",
            StageError::ToolSpawn { .. } | StageError::ToolFailed { .. } => "tool",
            StageError::Worker(_) | StageError::WorkerLost => "worker",
            StageError::WorkerPool(_) => "pool",
            StageError::Commit { .. } => "commit",
            StageError::DependencyFailed(_) => "dependency",
        }
    }

    /// Returns true for worker-reported data-quality errors.
    pub fn is_worker_error(&self) -> bool {
        matches!(self, StageError::Worker(_) | StageError::WorkerLost)
    }
}

/// Failure that stops the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A destination directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// The candidate feed failed mid-stream.
    #[error("catalogue feed failed: {0}")]
    Feed(#[from] FeedError),

    /// The controller's event channel closed before the run completed.
    #[error("pipeline driver stopped unexpectedly")]
    DriverStopped,

    /// A pipeline component panicked.
    #[error("pipeline component panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_kind() {
        assert_eq!(StageError::transport("http://x", "refused").kind(), "transport");
        assert_eq!(StageError::Worker("bad row".into()).kind(), "worker");
        assert_eq!(StageError::WorkerLost.kind(), "worker");
        assert_eq!(
            StageError::UnresolvedSource(TemplateError::UnknownKey("tile_x".into())).kind(),
            "unresolved"
        );
        assert_eq!(StageError::DependencyFailed("zlas".into()).kind(), "dependency");
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError::transport("http://archive/TM_1_2.zlas", "connection refused");
        assert_eq!(
            err.to_string(),
            "transport failure fetching http://archive/TM_1_2.zlas: connection refused"
        );

        let err = StageError::ToolFailed {
            tool: PathBuf::from("/opt/lastools/lasliberate"),
            status: "exit status: 3".into(),
            stderr: "corrupt input".into(),
        };
        assert!(err.to_string().contains("corrupt input"));
    }

    #[test]
    fn test_worker_error_classification() {
        assert!(StageError::Worker("x".into()).is_worker_error());
        assert!(!StageError::transport("a", "b").is_worker_error());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::CreateDir {
            path: PathBuf::from("/mirror/laz"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/mirror/laz"));
    }
}
