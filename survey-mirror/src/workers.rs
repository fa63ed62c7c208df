//! Worker pool for CPU-bound transform jobs.
//!
//! Grid encoding is CPU-bound and runs on a dedicated rayon pool instead of
//! the tokio runtime, so a burst of transforms cannot starve the I/O-bound
//! stages. Jobs are self-contained closures; results come back over a
//! oneshot channel.
//!
//! The pool is created on first use and torn down when the pipeline goes
//! quiescent. A later submit re-creates it. Teardown drops only the pool
//! handle; jobs already spawned keep their threads until they finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::StageError;

/// Returns the default worker count (available parallelism).
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// Lazily created, explicitly torn down rayon pool.
#[derive(Debug)]
pub struct WorkerPool {
    threads: usize,
    pool: Mutex<Option<Arc<ThreadPool>>>,
    created: AtomicUsize,
    teardowns: AtomicUsize,
}

impl WorkerPool {
    /// Creates an idle pool of `threads` workers. No threads start until the
    /// first submit.
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            pool: Mutex::new(None),
            created: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
        }
    }

    /// Runs `job` on a worker and awaits its result.
    ///
    /// Returns [`StageError::WorkerLost`] if the job panicked.
    pub async fn submit<T, F>(&self, job: F) -> Result<T, StageError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.handle()?;
        let (tx, rx) = oneshot::channel();
        pool.spawn(move || {
            let _ = tx.send(job());
        });
        drop(pool);

        rx.await.map_err(|_| StageError::WorkerLost)
    }

    /// Returns the live pool, starting it if needed.
    fn handle(&self) -> Result<Arc<ThreadPool>, StageError> {
        let mut guard = self.pool.lock();
        if let Some(pool) = guard.as_ref() {
            return Ok(Arc::clone(pool));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|idx| format!("grid-worker-{}", idx))
            .panic_handler(|_| error!("Worker job panicked"))
            .build()
            .map_err(|e| StageError::WorkerPool(e.to_string()))?;

        let pool = Arc::new(pool);
        *guard = Some(Arc::clone(&pool));
        let generation = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(threads = self.threads, generation, "Worker pool started");
        Ok(pool)
    }

    /// Releases the pool.
    ///
    /// Returns true if a live pool was torn down, false if it was already
    /// idle. Safe to call at any time.
    pub fn shutdown(&self) -> bool {
        let pool = self.pool.lock().take();
        match pool {
            Some(_) => {
                self.teardowns.fetch_add(1, Ordering::SeqCst);
                info!("Worker pool released");
                true
            }
            None => false,
        }
    }

    /// Returns true if the pool currently holds threads.
    pub fn is_live(&self) -> bool {
        self.pool.lock().is_some()
    }

    /// Configured worker count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// How many times the pool has been started.
    pub fn creation_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// How many times a live pool has been torn down.
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_idle() {
        let pool = WorkerPool::new(2);
        assert!(!pool.is_live());
        assert_eq!(pool.creation_count(), 0);
        assert!(!pool.shutdown());
        assert_eq!(pool.teardown_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_starts_pool_and_returns_result() {
        let pool = WorkerPool::new(2);
        let result = pool.submit(|| 6 * 7).await.unwrap();

        assert_eq!(result, 42);
        assert!(pool.is_live());
        assert_eq!(pool.creation_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_once_then_recreate() {
        let pool = WorkerPool::new(1);
        pool.submit(|| ()).await.unwrap();

        assert!(pool.shutdown());
        assert!(!pool.shutdown());
        assert_eq!(pool.teardown_count(), 1);

        pool.submit(|| ()).await.unwrap();
        assert_eq!(pool.creation_count(), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_reports_lost() {
        let pool = WorkerPool::new(1);
        let result: Result<(), _> = pool.submit(|| panic!("bad job")).await;
        assert!(matches!(result, Err(StageError::WorkerLost)));

        // The pool survives a panicking job.
        assert_eq!(pool.submit(|| 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_does_not_drop_in_flight_job() {
        let pool = WorkerPool::new(1);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let pending = pool.submit(move || {
            let _ = release_rx.recv();
            "done"
        });
        tokio::pin!(pending);

        // Let the job start, tear down, then release it.
        tokio::select! {
            _ = &mut pending => panic!("job finished early"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }
        assert!(pool.shutdown());
        release_tx.send(()).unwrap();

        assert_eq!(pending.await.unwrap(), "done");
    }
}
