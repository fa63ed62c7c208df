//! Stage executors.
//!
//! Each [`Operation`] maps to one executor:
//!
//! | Operation | Executor | Bounded by |
//! |-----------|----------|------------|
//! | `Transfer` | [`transfer::transfer`] via a [`Fetcher`] | network bandwidth |
//! | `Liberate` | [`LiberationTool::liberate`] | external tool / CPU |
//! | `GridTransform` | [`transform::grid_transform`] on the [`WorkerPool`] | worker CPU |
//!
//! Executors never panic on bad input and never leave partial files at a
//! drain path. Their errors are reported to the finish handler, which decides
//! what happens next.

pub mod liberation;
pub mod transfer;
pub mod transform;

use std::sync::Arc;

pub use liberation::LiberationTool;
pub use transfer::{ArchiveFetcher, BoxFuture, Fetcher};

use crate::error::StageError;
use crate::recipe::Operation;
use crate::task::Task;
use crate::workers::WorkerPool;

/// The executors shared by every task in a run.
#[derive(Clone)]
pub struct Stages {
    fetcher: Arc<dyn Fetcher>,
    liberator: Arc<LiberationTool>,
    workers: Arc<WorkerPool>,
}

impl Stages {
    pub fn new(fetcher: Arc<dyn Fetcher>, liberator: LiberationTool, workers: Arc<WorkerPool>) -> Self {
        Self {
            fetcher,
            liberator: Arc::new(liberator),
            workers,
        }
    }

    /// The worker pool used by grid transforms.
    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    /// Runs the task's operation from its resolved source to its drain.
    pub async fn execute(&self, task: &Task) -> Result<(), StageError> {
        let source = task
            .location()
            .ok_or_else(|| StageError::DependencyFailed(task.name().to_string()))?;
        let drain = task.drain();

        match task.recipe().operation() {
            Operation::Transfer => transfer::transfer(self.fetcher.as_ref(), source, drain)
                .await
                .map(|_| ()),
            Operation::Liberate => self.liberator.liberate(source, drain).await,
            Operation::GridTransform => {
                transform::grid_transform(&self.workers, source, drain, task.params().tile_origin())
                    .await
                    .map(|_| ())
            }
        }
    }
}

impl std::fmt::Debug for Stages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stages")
            .field("liberator", &self.liberator)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}
