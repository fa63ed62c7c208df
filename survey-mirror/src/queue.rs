//! Bounded stage queues.
//!
//! Each pipeline stage runs behind its own [`StageQueue`]: a semaphore-bounded
//! executor that accepts any number of jobs but runs at most `limit` of them
//! at once. Queues are independent, so a burst of downloads never starves the
//! liberation tool and vice versa.
//!
//! ```text
//! initialize ─► dispatch ─► transfer   (4)  ─► finish
//!    (10)         (10)   ├► liberation (6)  ─►  (10)
//!                        └► transform  (12) ─►
//! ```
//!
//! Every queue tracks how many jobs are waiting for a permit and how many are
//! running. The sum is the queue depth shown in status lines.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};
use tracing::{debug, trace};

use crate::recipe::Operation;

/// Default concurrency of the initialize, dispatch and finish queues.
pub const DEFAULT_CONTROL_LIMIT: usize = 10;

/// Default concurrency of the transfer queue.
pub const DEFAULT_TRANSFER_LIMIT: usize = 4;

/// Default concurrency of the liberation queue.
pub const DEFAULT_LIBERATION_LIMIT: usize = 6;

/// Default concurrency of the grid transform queue.
pub const DEFAULT_TRANSFORM_LIMIT: usize = 12;

/// Concurrency limits for every stage queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub initialize: usize,
    pub dispatch: usize,
    pub finish: usize,
    pub transfer: usize,
    pub liberation: usize,
    pub transform: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            initialize: DEFAULT_CONTROL_LIMIT,
            dispatch: DEFAULT_CONTROL_LIMIT,
            finish: DEFAULT_CONTROL_LIMIT,
            transfer: DEFAULT_TRANSFER_LIMIT,
            liberation: DEFAULT_LIBERATION_LIMIT,
            transform: DEFAULT_TRANSFORM_LIMIT,
        }
    }
}

impl QueueLimits {
    /// Returns the limit of the queue executing `operation`.
    pub fn for_operation(&self, operation: Operation) -> usize {
        match operation {
            Operation::Transfer => self.transfer,
            Operation::Liberate => self.liberation,
            Operation::GridTransform => self.transform,
        }
    }
}

/// Concurrency-limited executor for one pipeline stage.
#[derive(Debug)]
pub struct StageQueue {
    label: &'static str,
    limit: usize,
    semaphore: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl StageQueue {
    /// Creates a queue running at most `limit` jobs at once.
    ///
    /// A limit of zero is raised to one.
    pub fn new(label: &'static str, limit: usize) -> Self {
        let limit = limit.max(1);
        debug!(queue = label, limit, "Created stage queue");
        Self {
            label,
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            pending: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Queues `job` for execution.
    ///
    /// Returns immediately; the job runs on the tokio runtime as soon as a
    /// permit is free. Must be called from within a runtime.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);

        let semaphore = Arc::clone(&self.semaphore);
        let pending = Arc::clone(&self.pending);
        let active = Arc::clone(&self.active);
        let idle = Arc::clone(&self.idle);
        let label = self.label;

        tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            active.fetch_add(1, Ordering::SeqCst);
            pending.fetch_sub(1, Ordering::SeqCst);
            let _slot = ActiveSlot { active, idle };

            match permit {
                Ok(_permit) => job.await,
                // The semaphore is never closed while the queue is alive.
                Err(_) => trace!(queue = label, "Queue closed, job skipped"),
            }
        });
    }

    /// Returns the queue's label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns the concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Jobs waiting for a permit.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Jobs currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waiting plus running jobs.
    pub fn depth(&self) -> usize {
        self.pending() + self.active()
    }

    /// Resolves once no job is waiting or running.
    ///
    /// Woken by each job as it ends, so an empty queue resolves at once.
    pub async fn idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Registered ahead of the depth check.
            notified.as_mut().enable();
            if self.depth() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the active counter when a job ends, including on panic, and
/// wakes anyone waiting for the queue to drain.
struct ActiveSlot {
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

/// Snapshot of every queue's depth, in pipeline order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub initialize: usize,
    pub dispatch: usize,
    pub transfer: usize,
    pub liberation: usize,
    pub transform: usize,
    pub finish: usize,
}

impl QueueDepths {
    /// Sum of all depths.
    pub fn total(&self) -> usize {
        self.initialize
            + self.dispatch
            + self.transfer
            + self.liberation
            + self.transform
            + self.finish
    }
}

impl fmt::Display for QueueDepths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>4} {:>4} {:>4} {:>4} {:>4} {:>4}",
            self.initialize,
            self.dispatch,
            self.transfer,
            self.liberation,
            self.transform,
            self.finish
        )
    }
}

/// The full set of stage queues for one pipeline.
#[derive(Debug)]
pub struct StageQueues {
    pub initialize: StageQueue,
    pub dispatch: StageQueue,
    pub finish: StageQueue,
    pub transfer: StageQueue,
    pub liberation: StageQueue,
    pub transform: StageQueue,
}

impl StageQueues {
    /// Creates all queues with the given limits.
    pub fn new(limits: &QueueLimits) -> Self {
        Self {
            initialize: StageQueue::new("initialize", limits.initialize),
            dispatch: StageQueue::new("dispatch", limits.dispatch),
            finish: StageQueue::new("finish", limits.finish),
            transfer: StageQueue::new(Operation::Transfer.key(), limits.transfer),
            liberation: StageQueue::new(Operation::Liberate.key(), limits.liberation),
            transform: StageQueue::new(Operation::GridTransform.key(), limits.transform),
        }
    }

    /// Returns the queue executing `operation`.
    pub fn for_operation(&self, operation: Operation) -> &StageQueue {
        match operation {
            Operation::Transfer => &self.transfer,
            Operation::Liberate => &self.liberation,
            Operation::GridTransform => &self.transform,
        }
    }

    /// Snapshot of all queue depths.
    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            initialize: self.initialize.depth(),
            dispatch: self.dispatch.depth(),
            transfer: self.transfer.depth(),
            liberation: self.liberation.depth(),
            transform: self.transform.depth(),
            finish: self.finish.depth(),
        }
    }

    /// Resolves once every queue is empty at the same time.
    pub async fn idle(&self) {
        while self.depths().total() > 0 {
            self.initialize.idle().await;
            self.dispatch.idle().await;
            self.transfer.idle().await;
            self.liberation.idle().await;
            self.transform.idle().await;
            self.finish.idle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_default_limits() {
        let limits = QueueLimits::default();
        assert_eq!(limits.initialize, 10);
        assert_eq!(limits.transfer, 4);
        assert_eq!(limits.liberation, 6);
        assert_eq!(limits.transform, 12);
        assert_eq!(limits.for_operation(Operation::Liberate), 6);
    }

    #[test]
    fn test_zero_limit_is_raised() {
        assert_eq!(StageQueue::new("transfer", 0).limit(), 1);
    }

    #[tokio::test]
    async fn test_queue_bounds_concurrency() {
        let queue = StageQueue::new("transfer", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done_tx = done_tx.clone();
            queue.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }
        drop(done_tx);

        let mut finished = 0;
        while done_rx.recv().await.is_some() {
            finished += 1;
        }

        assert_eq!(finished, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_depth_tracks_pending_and_active() {
        let queue = StageQueue::new("liberation", 1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        queue.spawn(async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
        });
        queue.spawn(async {});

        started_rx.await.unwrap();
        assert_eq!(queue.active(), 1);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.depth(), 2);

        release_tx.send(()).unwrap();
        for _ in 0..100 {
            if queue.depth() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_idle_waits_for_running_jobs() {
        let queue = StageQueue::new("transform", 1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        queue.spawn(async move {
            let _ = release_rx.await;
        });
        queue.spawn(async {});
        assert_eq!(queue.depth(), 2);

        let early = tokio::time::timeout(Duration::from_millis(20), queue.idle()).await;
        assert!(early.is_err());

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), queue.idle())
            .await
            .unwrap();
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_idle_resolves_on_empty_queues() {
        let queues = StageQueues::new(&QueueLimits::default());
        tokio::time::timeout(Duration::from_secs(1), queues.idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stage_queues_route_by_operation() {
        let queues = StageQueues::new(&QueueLimits::default());
        assert_eq!(queues.for_operation(Operation::Transfer).label(), "transfer");
        assert_eq!(queues.for_operation(Operation::Liberate).label(), "liberation");
        assert_eq!(queues.for_operation(Operation::GridTransform).limit(), 12);
        assert_eq!(queues.depths().total(), 0);
    }

    #[test]
    fn test_depths_display_is_fixed_width() {
        let depths = QueueDepths {
            initialize: 1,
            dispatch: 22,
            transfer: 4,
            liberation: 0,
            transform: 120,
            finish: 3,
        };
        assert_eq!(depths.to_string(), "   1   22    4    0  120    3");
        assert_eq!(depths.total(), 150);
    }
}
