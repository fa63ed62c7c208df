//! Tasks: recipes instantiated for one record.
//!
//! A [`Task`] carries everything a stage needs: the record, the recipe, the
//! rendered params, the resolved drain path and the state of its source. A
//! task whose recipe has a derived source spawns a child task and moves into
//! it as the child's `parent`; when the child finishes, the parent is taken
//! back out, given the child's drain as its source, and dispatched.
//!
//! Tasks are plain owned values. Exactly one stage holds a task at any time
//! because the task itself is what travels between stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalogue::Record;
use crate::error::StageError;
use crate::fsutil;
use crate::recipe::Recipe;
use crate::template::{Params, TemplateError};

/// Resolution state of a task's input.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSource {
    /// Waiting for a child task to produce the input.
    Pending,
    /// Resolved URL or filesystem path.
    Location(String),
    /// The drain already existed; there is no input to consume.
    AlreadySatisfied,
    /// The source template could not be rendered for this record.
    Unresolved(TemplateError),
}

/// How a task's lifecycle ended.
#[derive(Debug)]
pub enum Outcome {
    /// The drain was already on disk.
    Satisfied,
    /// The stage produced the drain.
    Committed,
    /// The stage failed; no drain was produced.
    Failed(StageError),
}

impl Outcome {
    /// Returns true if the drain exists after this outcome.
    pub fn produced_drain(&self) -> bool {
        matches!(self, Outcome::Satisfied | Outcome::Committed)
    }
}

/// One in-flight unit of work.
#[derive(Debug)]
pub struct Task {
    record: Arc<Record>,
    recipe: Arc<Recipe>,
    params: Params,
    drain: PathBuf,
    name: String,
    source: TaskSource,
    parent: Option<Box<Task>>,
    started: Option<Instant>,
}

impl Task {
    /// Creates a task with a pending source.
    pub fn new(record: Arc<Record>, recipe: Arc<Recipe>, params: Params, drain: PathBuf) -> Self {
        let name = drain
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.name().to_string());
        Self {
            record,
            recipe,
            params,
            drain,
            name,
            source: TaskSource::Pending,
            parent: None,
            started: None,
        }
    }

    /// Attaches the task waiting on this one's drain.
    pub fn with_parent(mut self, parent: Task) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }

    pub fn recipe(&self) -> &Arc<Recipe> {
        &self.recipe
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Final output path.
    pub fn drain(&self) -> &Path {
        &self.drain
    }

    /// Display name (the drain's file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &TaskSource {
        &self.source
    }

    /// Resolved source location, if any.
    pub fn location(&self) -> Option<&str> {
        match &self.source {
            TaskSource::Location(location) => Some(location),
            _ => None,
        }
    }

    /// Local file backing the source, if the source is on the filesystem.
    ///
    /// Remote URLs return `None`; they are never candidates for deletion.
    pub fn local_source(&self) -> Option<PathBuf> {
        self.location().and_then(fsutil::local_path)
    }

    /// Sets the source to a concrete location.
    pub fn resolve(&mut self, location: impl Into<String>) {
        self.source = TaskSource::Location(location.into());
    }

    /// Records that the drain already exists.
    pub fn mark_satisfied(&mut self) {
        self.source = TaskSource::AlreadySatisfied;
    }

    /// Records that the source could not be rendered.
    pub fn mark_unresolved(&mut self, error: TemplateError) {
        self.source = TaskSource::Unresolved(error);
    }

    /// Returns true if a parent is waiting on this task.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Detaches the waiting parent.
    pub fn take_parent(&mut self) -> Option<Task> {
        self.parent.take().map(|p| *p)
    }

    /// Number of tasks in this chain, including this one.
    pub fn chain_len(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.chain_len())
    }

    /// Stamps the dispatch time.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Time since dispatch, or zero if never dispatched.
    pub fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }
}
