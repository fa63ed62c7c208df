//! Messages exchanged between stage jobs and the driver loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalogue::Record;
use crate::error::PipelineError;
use crate::recipe::Recipe;
use crate::task::{Outcome, Task};

/// Request to instantiate `recipe` for `record`.
///
/// `parent` is set when the recipe is the derived source of another task;
/// the parent travels inside the child until the child finishes.
#[derive(Debug)]
pub struct InitRequest {
    pub record: Arc<Record>,
    pub recipe: Arc<Recipe>,
    pub parent: Option<Task>,
}

/// Everything the driver reacts to.
#[derive(Debug)]
pub enum Event {
    /// A catalogue entry selected for a region.
    Record(Arc<Record>),
    /// The feed is exhausted.
    FeedClosed,
    /// Run the initializer for a new task.
    Initialize(InitRequest),
    /// A task's source is settled; route it.
    Dispatch(Task),
    /// Run the task's stage operation.
    Execute(Task),
    /// A stage completed (or the drain already existed).
    Finish(Task, Outcome),
    /// A task chain ended.
    Retired,
    /// The run cannot continue.
    Fatal(PipelineError),
}

/// Sending half held by every job.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Sends an event, ignoring a closed channel.
///
/// The channel only closes after the driver has stopped, at which point the
/// event no longer matters.
pub fn emit(tx: &EventSender, event: Event) {
    let _ = tx.send(event);
}
