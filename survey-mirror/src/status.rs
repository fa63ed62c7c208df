//! Status reporting and run counters.
//!
//! Every task event produces one fixed-width status line, so an operator can
//! see at a glance which stage queue is backing up:
//!
//! ```text
//! init disp xfer libr grid fini       region recipe             name
//!    0    3    4    6    0    1    Ljubljana    laz   TM_462_101.laz  downloading
//! ```
//!
//! Counters are lock-free atomics; [`PipelineStats::snapshot`] copies them
//! into a [`RunSummary`] for display.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StageError;
use crate::queue::StageQueues;
use crate::task::Task;

/// Default duration above which task completion is logged.
pub const DEFAULT_REPORT_THRESHOLD: Duration = Duration::from_millis(500);

/// Emits status lines for task events.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    queues: Arc<StageQueues>,
    threshold: Duration,
}

impl StatusReporter {
    pub fn new(queues: Arc<StageQueues>, threshold: Duration) -> Self {
        Self { queues, threshold }
    }

    /// Formats the status line for `task` without logging it.
    pub fn line(&self, task: &Task, message: &str) -> String {
        format!(
            "{} {:>12} {:>6} {:>16}  {}",
            self.queues.depths(),
            task.record().region().name(),
            task.recipe().name(),
            task.name(),
            message
        )
    }

    /// Logs a status line at info level.
    pub fn report(&self, task: &Task, message: &str) {
        info!("{}", self.line(task, message));
    }

    /// Logs completion if the task ran longer than the threshold.
    pub fn completed(&self, task: &Task) {
        let elapsed = task.elapsed();
        if elapsed > self.threshold {
            let message = format!(
                "{} in {:.1}s",
                task.recipe().operation().verbed(),
                elapsed.as_secs_f64()
            );
            self.report(task, &message);
        }
    }

    /// Logs a task failure at warn level.
    pub fn failed(&self, task: &Task, error: &StageError) {
        let message = format!("{} error: {}", task.recipe().operation().noun(), error);
        warn!(kind = error.kind(), "{}", self.line(task, &message));
    }

    /// Logs a parent retired because its dependency was not produced.
    pub fn abandoned(&self, task: &Task) {
        debug!("{}", self.line(task, "abandoned, dependency not produced"));
    }

    /// Column headings matching [`line`](Self::line).
    pub fn header() -> String {
        format!(
            "{:>4} {:>4} {:>4} {:>4} {:>4} {:>4} {:>12} {:>6} {:>16}",
            "init", "disp", "xfer", "libr", "grid", "fini", "region", "recipe", "name"
        )
    }
}

/// Lock-free run counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    records_seen: AtomicU64,
    records_malformed: AtomicU64,
    records_selected: AtomicU64,
    tasks_created: AtomicU64,
    duplicates: AtomicU64,
    satisfied: AtomicU64,
    committed: AtomicU64,
    dropped: AtomicU64,
    worker_errors: AtomicU64,
    sources_deleted: AtomicU64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_seen => records_seen,
        record_malformed => records_malformed,
        record_selected => records_selected,
        task_created => tasks_created,
        duplicate => duplicates,
        satisfied => satisfied,
        committed => committed,
        dropped => dropped,
        worker_error => worker_errors,
        source_deleted => sources_deleted,
    }

    /// Copies the counters.
    pub fn snapshot(&self, elapsed: Duration) -> RunSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        RunSummary {
            records_seen: load(&self.records_seen),
            records_malformed: load(&self.records_malformed),
            records_selected: load(&self.records_selected),
            tasks_created: load(&self.tasks_created),
            duplicates: load(&self.duplicates),
            satisfied: load(&self.satisfied),
            committed: load(&self.committed),
            dropped: load(&self.dropped),
            worker_errors: load(&self.worker_errors),
            sources_deleted: load(&self.sources_deleted),
            elapsed,
        }
    }
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Entries read from the feed.
    pub records_seen: u64,
    /// Entries the feed could not decode.
    pub records_malformed: u64,
    /// (entry, region) pairs accepted by the spatial filter.
    pub records_selected: u64,
    /// Tasks created, including nested ones.
    pub tasks_created: u64,
    /// Tasks discarded because their drain was already claimed.
    pub duplicates: u64,
    /// Tasks whose drain already existed.
    pub satisfied: u64,
    /// Tasks that produced their drain.
    pub committed: u64,
    /// Tasks that failed or were abandoned.
    pub dropped: u64,
    /// Subset of `dropped` caused by bad input data.
    pub worker_errors: u64,
    /// Intermediate sources deleted after use.
    pub sources_deleted: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunSummary {
    /// Tasks that reached the end of their lifecycle.
    pub fn finished(&self) -> u64 {
        self.satisfied + self.committed + self.dropped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records seen:      {}", self.records_seen)?;
        writeln!(f, "  malformed:       {}", self.records_malformed)?;
        writeln!(f, "  selected:        {}", self.records_selected)?;
        writeln!(f, "Tasks created:     {}", self.tasks_created)?;
        writeln!(f, "  duplicates:      {}", self.duplicates)?;
        writeln!(f, "  already present: {}", self.satisfied)?;
        writeln!(f, "  committed:       {}", self.committed)?;
        writeln!(f, "  dropped:         {}", self.dropped)?;
        writeln!(f, "  worker errors:   {}", self.worker_errors)?;
        writeln!(f, "Sources deleted:   {}", self.sources_deleted)?;
        write!(f, "Elapsed:           {:.1}s", self.elapsed.as_secs_f64())
    }
}
