//! Stage jobs: initialize, dispatch, execute and finish.
//!
//! Each job handles one task and ends by emitting exactly one event, which
//! is how the task moves on. Jobs never call each other.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::events::{emit, Event, EventSender, InitRequest};
use super::Shared;
use crate::error::{PipelineError, StageError};
use crate::fsutil;
use crate::recipe::{Operation, Source};
use crate::task::{Outcome, Task, TaskSource};
use crate::template::Params;

/// Resource initializer.
///
/// Renders the drain, claims it, short-circuits existing output, prepares
/// the destination directory and either resolves the source or spawns the
/// child task that will produce it.
pub(super) async fn initialize(shared: Arc<Shared>, tx: EventSender, request: InitRequest) {
    let InitRequest {
        record,
        recipe,
        parent,
    } = request;

    let params = Params::derive(&record, shared.config.tile_size, &shared.config.vars);
    let drain = match shared.renderer.render(recipe.drain(), &params) {
        Ok(drain) => PathBuf::from(drain),
        Err(e) => {
            warn!(
                region = record.region().name(),
                recipe = recipe.name(),
                record = record.name(),
                error = %e,
                "Unable to render drain"
            );
            shared.stats.dropped();
            retire_parent(&shared, parent);
            emit(&tx, Event::Retired);
            return;
        }
    };

    let mut task = Task::new(record, recipe, params, drain);
    if let Some(parent) = parent {
        task = task.with_parent(parent);
    }

    if needs_tile_origin(task.recipe().operation()) && task.params().tile_origin().is_none() {
        warn!(
            region = task.record().region().name(),
            recipe = task.recipe().name(),
            record = task.record().name(),
            "Record name does not encode a tile origin"
        );
        shared.stats.record_malformed();
        shared.stats.dropped();
        retire_parent(&shared, task.take_parent());
        emit(&tx, Event::Retired);
        return;
    }

    if !shared.dedup.claim(task.drain()) {
        shared.stats.duplicate();
        debug!(drain = %task.drain().display(), "Duplicate drain");
        if let Some(parent) = task.take_parent() {
            shared.reporter.abandoned(&parent);
            shared.stats.dropped();
        }
        emit(&tx, Event::Retired);
        return;
    }

    if fsutil::is_file(task.drain()).await {
        task.mark_satisfied();
        emit(&tx, Event::Finish(task, Outcome::Satisfied));
        return;
    }

    if let Some(dir) = task.drain().parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(source) = tokio::fs::create_dir_all(dir).await {
            emit(
                &tx,
                Event::Fatal(PipelineError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                }),
            );
            return;
        }
    }

    let recipe = Arc::clone(task.recipe());
    match recipe.source() {
        Source::Literal(template) => {
            match shared.renderer.render(template, task.params()) {
                Ok(location) => task.resolve(location),
                Err(e) => task.mark_unresolved(e),
            }
            emit(&tx, Event::Dispatch(task));
        }
        Source::Derived(inner) => {
            let child = InitRequest {
                record: Arc::clone(task.record()),
                recipe: Arc::new(inner.as_ref().clone()),
                parent: Some(task),
            };
            emit(&tx, Event::Initialize(child));
        }
    }
}

/// Dispatcher: routes a task with a settled source to its stage queue.
pub(super) async fn dispatch(shared: Arc<Shared>, tx: EventSender, mut task: Task) {
    let error = match task.source() {
        TaskSource::Location(_) => {
            let message = format!("{} required", task.recipe().operation().noun());
            shared.reporter.report(&task, &message);
            task.start();
            emit(&tx, Event::Execute(task));
            return;
        }
        TaskSource::Unresolved(e) => StageError::UnresolvedSource(e.clone()),
        TaskSource::Pending | TaskSource::AlreadySatisfied => {
            StageError::DependencyFailed(task.name().to_string())
        }
    };

    shared.reporter.failed(&task, &error);
    shared.stats.dropped();
    retire_parent(&shared, task.take_parent());
    emit(&tx, Event::Retired);
}

/// Runs the task's stage operation.
pub(super) async fn execute(shared: Arc<Shared>, tx: EventSender, task: Task) {
    shared
        .reporter
        .report(&task, task.recipe().operation().verbing());

    let outcome = match shared.stages.execute(&task).await {
        Ok(()) => Outcome::Committed,
        Err(e) => Outcome::Failed(e),
    };
    emit(&tx, Event::Finish(task, outcome));
}

/// Finish handler: bookkeeping, cleanup and parent re-entry.
pub(super) async fn finish(shared: Arc<Shared>, tx: EventSender, mut task: Task, outcome: Outcome) {
    match &outcome {
        Outcome::Satisfied => shared.stats.satisfied(),
        Outcome::Committed => {
            shared.stats.committed();
            shared.reporter.completed(&task);
            if task.recipe().delete_source_after_use() {
                delete_source(&shared, &task).await;
            }
        }
        Outcome::Failed(error) => {
            shared.stats.dropped();
            if error.is_worker_error() {
                shared.stats.worker_error();
            }
            shared.reporter.failed(&task, error);
        }
    }

    if let Some(mut parent) = task.take_parent() {
        if outcome.produced_drain() {
            parent.resolve(task.drain().to_string_lossy());
            emit(&tx, Event::Dispatch(parent));
            return;
        }
        shared.reporter.abandoned(&parent);
        shared.stats.dropped();
    }

    emit(&tx, Event::Retired);
}

async fn delete_source(shared: &Shared, task: &Task) {
    let Some(source) = task.local_source() else {
        return;
    };
    if !fsutil::is_file(&source).await {
        return;
    }

    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    shared.reporter.report(task, &format!("deleting {}", name));
    if fsutil::remove_if_exists(&source).await {
        shared.stats.source_deleted();
    }
}

/// Operations whose job is placed relative to the record's tile origin.
fn needs_tile_origin(operation: Operation) -> bool {
    matches!(operation, Operation::GridTransform)
}

/// Retires a parent whose dependency will never be produced.
fn retire_parent(shared: &Shared, parent: Option<Task>) {
    if let Some(parent) = parent {
        shared.reporter.abandoned(&parent);
        shared.stats.dropped();
    }
}
