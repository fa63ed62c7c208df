//! Pipeline controller.
//!
//! Drives every task through its lifecycle:
//!
//! ```text
//!  feed ─► Record ─► Initialize ─┬─► Dispatch ─► Execute ─► Finish ─┬─► Retired
//!                     ▲          │   (transfer | liberation |       │
//!                     │          │    transform queue)              │
//!                     └─ child ◄─┘                                  │
//!                                          parent re-dispatch ◄─────┘
//! ```
//!
//! A single driver loop owns all routing. Stage jobs run on their bounded
//! [`StageQueues`] and report back over an unbounded channel with one
//! [`Event`](events::Event) each; the loop spawns the next job. The loop
//! also counts outstanding work (live task chains, plus one while the feed
//! is open). When that count reaches zero the run is quiescent: the worker
//! pool is released and [`Pipeline::run`] returns.

mod events;
mod handlers;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalogue::{CandidateFeed, Record};
use crate::config::{DEFAULT_LIBERATION_TOOL, DEFAULT_TILE_SIZE};
use crate::dedup::DedupCache;
use crate::error::PipelineError;
use crate::queue::{QueueLimits, StageQueues};
use crate::recipe::Recipe;
use crate::region::{ExpandedBoundsFilter, Region, SpatialFilter};
use crate::stages::transfer::DEFAULT_TIMEOUT_SECS;
use crate::stages::{ArchiveFetcher, Fetcher, LiberationTool, Stages};
use crate::status::{PipelineStats, RunSummary, StatusReporter, DEFAULT_REPORT_THRESHOLD};
use crate::template::{PlaceholderRenderer, TemplateRenderer};
use crate::workers::{default_threads, WorkerPool};

use events::{emit, Event, EventSender, InitRequest};

/// Settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Top-level recipes; each is instantiated for every selected record.
    pub recipes: Vec<Recipe>,
    /// Areas of interest.
    pub regions: Vec<Arc<Region>>,
    /// Tile edge length; the spatial filter and bounds use half of it.
    pub tile_size: u32,
    /// Template variables shared by all tasks.
    pub vars: BTreeMap<String, String>,
    pub queues: QueueLimits,
    /// Worker pool size.
    pub workers: usize,
    /// Completion is logged for tasks slower than this.
    pub report_threshold: Duration,
    /// Read timeout for the default fetcher: how long a download may stall.
    pub transfer_timeout: Duration,
    /// External liberation tool.
    pub liberation: LiberationTool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recipes: Vec::new(),
            regions: Vec::new(),
            tile_size: DEFAULT_TILE_SIZE,
            vars: BTreeMap::new(),
            queues: QueueLimits::default(),
            workers: default_threads(),
            report_threshold: DEFAULT_REPORT_THRESHOLD,
            transfer_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            liberation: LiberationTool::new(DEFAULT_LIBERATION_TOOL),
        }
    }
}

/// State shared by the driver and every stage job.
pub(crate) struct Shared {
    config: PipelineConfig,
    renderer: Arc<dyn TemplateRenderer>,
    filter: Arc<dyn SpatialFilter>,
    stages: Stages,
    dedup: DedupCache,
    stats: PipelineStats,
    queues: Arc<StageQueues>,
    reporter: StatusReporter,
}

/// Builder for [`Pipeline`], with replaceable collaborators.
pub struct PipelineBuilder {
    config: PipelineConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    filter: Option<Arc<dyn SpatialFilter>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            fetcher: None,
            renderer: None,
            filter: None,
        }
    }

    /// Replaces the transfer fetcher (default: [`ArchiveFetcher`]).
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces the template renderer (default: [`PlaceholderRenderer`]).
    pub fn renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replaces the spatial filter (default: [`ExpandedBoundsFilter`]).
    pub fn filter(mut self, filter: Arc<dyn SpatialFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ArchiveFetcher::new(self.config.transfer_timeout)?),
        };
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(PlaceholderRenderer));
        let filter = self.filter.unwrap_or_else(|| {
            Arc::new(ExpandedBoundsFilter::for_tile_size(self.config.tile_size))
        });

        let queues = Arc::new(StageQueues::new(&self.config.queues));
        let reporter = StatusReporter::new(Arc::clone(&queues), self.config.report_threshold);
        let workers = Arc::new(WorkerPool::new(self.config.workers));
        let stages = Stages::new(fetcher, self.config.liberation.clone(), workers);

        Ok(Pipeline {
            shared: Arc::new(Shared {
                config: self.config,
                renderer,
                filter,
                stages,
                dedup: DedupCache::new(),
                stats: PipelineStats::new(),
                queues,
                reporter,
            }),
        })
    }
}

/// The resource-dependency pipeline.
///
/// The dedup cache and counters live as long as the pipeline, so running a
/// second feed through the same pipeline never repeats a drain.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    /// Builds a pipeline with the default collaborators.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        PipelineBuilder::new(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// The worker pool used for grid transforms.
    pub fn workers(&self) -> &WorkerPool {
        self.shared.stages.workers()
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.shared.dedup
    }

    pub fn queues(&self) -> &StageQueues {
        &self.shared.queues
    }

    /// Current counters.
    pub fn stats(&self, elapsed: Duration) -> RunSummary {
        self.shared.stats.snapshot(elapsed)
    }

    /// Runs `feed` to quiescence.
    ///
    /// Returns the run counters, or the first fatal error. Task failures are
    /// logged and counted but never fail the run.
    pub async fn run<F>(&self, feed: F) -> Result<RunSummary, PipelineError>
    where
        F: CandidateFeed + 'static,
    {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        info!(
            recipes = self.shared.config.recipes.len(),
            regions = self.shared.config.regions.len(),
            "Pipeline started"
        );
        info!("{}", StatusReporter::header());

        let reader = {
            let shared = Arc::clone(&self.shared);
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || read_feed(&shared, feed, &tx))
        };

        // Live task chains, plus one while the feed is open.
        let mut outstanding: usize = 1;
        let result = loop {
            let Some(event) = rx.recv().await else {
                break Err(PipelineError::DriverStopped);
            };

            match event {
                Event::Record(record) => {
                    for recipe in &self.shared.config.recipes {
                        outstanding += 1;
                        self.spawn_initialize(
                            &tx,
                            InitRequest {
                                record: Arc::clone(&record),
                                recipe: Arc::new(recipe.clone()),
                                parent: None,
                            },
                        );
                    }
                }
                Event::FeedClosed => outstanding -= 1,
                Event::Initialize(request) => self.spawn_initialize(&tx, request),
                Event::Dispatch(task) => {
                    let job = handlers::dispatch(Arc::clone(&self.shared), tx.clone(), task);
                    self.shared.queues.dispatch.spawn(job);
                }
                Event::Execute(task) => {
                    let queue = self.shared.queues.for_operation(task.recipe().operation());
                    queue.spawn(handlers::execute(Arc::clone(&self.shared), tx.clone(), task));
                }
                Event::Finish(task, outcome) => {
                    let job = handlers::finish(Arc::clone(&self.shared), tx.clone(), task, outcome);
                    self.shared.queues.finish.spawn(job);
                }
                Event::Retired => outstanding -= 1,
                Event::Fatal(error) => break Err(error),
            }

            if outstanding == 0 {
                break Ok(());
            }
        };

        if let Err(error) = result {
            warn!(error = %error, "Pipeline stopped");
            self.shared.stages.workers().shutdown();
            return Err(error);
        }

        if let Err(e) = reader.await {
            return Err(PipelineError::Panicked(e.to_string()));
        }
        self.settle().await;

        if self.shared.stages.workers().shutdown() {
            debug!("Quiescent, worker pool torn down");
        }

        let summary = self.shared.stats.snapshot(started.elapsed());
        info!(
            committed = summary.committed,
            satisfied = summary.satisfied,
            dropped = summary.dropped,
            duplicates = summary.duplicates,
            "Pipeline finished"
        );
        Ok(summary)
    }

    fn spawn_initialize(&self, tx: &EventSender, request: InitRequest) {
        self.shared.stats.task_created();
        let job = handlers::initialize(Arc::clone(&self.shared), tx.clone(), request);
        self.shared.queues.initialize.spawn(job);
    }

    /// Waits for the last jobs to leave their queues.
    ///
    /// Every task chain has retired by now; what remains are jobs returning
    /// after their final event.
    async fn settle(&self) {
        self.shared.queues.idle().await;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.shared.config)
            .field("stages", &self.shared.stages)
            .finish_non_exhaustive()
    }
}

/// Reads the feed to the end, pairing each entry with every region that
/// accepts it. Runs on a blocking thread.
fn read_feed<F: CandidateFeed>(shared: &Shared, mut feed: F, tx: &EventSender) {
    while let Some(next) = feed.next_entry() {
        let entry = match next {
            Ok(entry) => entry,
            Err(e) if e.is_recoverable() => {
                shared.stats.record_seen();
                shared.stats.record_malformed();
                warn!(error = %e, "Skipping catalogue entry");
                continue;
            }
            Err(e) => {
                emit(tx, Event::Fatal(PipelineError::Feed(e)));
                return;
            }
        };
        shared.stats.record_seen();

        for region in &shared.config.regions {
            if shared.filter.accepts(&entry, region) {
                shared.stats.record_selected();
                let record = Record::new(entry.clone(), Arc::clone(region));
                emit(tx, Event::Record(Arc::new(record)));
            }
        }
    }
    emit(tx, Event::FeedClosed);
}
