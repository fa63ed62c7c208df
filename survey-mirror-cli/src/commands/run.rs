//! Run command - mirror every configured recipe for the catalogue feed.

use std::path::PathBuf;

use survey_mirror::catalogue::JsonLinesFeed;
use survey_mirror::config::ConfigFile;
use survey_mirror::logging::init_logging;
use survey_mirror::pipeline::{Pipeline, PipelineConfig};
use tracing::info;

use super::load_config;
use crate::error::CliError;

/// Arguments for the run command.
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub records: Option<PathBuf>,
    pub transfer: Option<usize>,
    pub liberation: Option<usize>,
    pub transform: Option<usize>,
    pub workers: Option<usize>,
    pub tool: Option<PathBuf>,
    pub json: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    // Logging comes up before the runtime so the local offset can be read.
    let _guard = init_logging(args.verbose, config.log_directory.as_deref())?;

    let records = args
        .records
        .clone()
        .or_else(|| config.records.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No catalogue feed configured. \
                 Set [feed] records in config.ini or use --records."
                    .to_string(),
            )
        })?;
    let pipeline_config = resolve_pipeline_config(&config, &args)?;

    info!(
        records = %records.display(),
        workers = pipeline_config.workers,
        "Starting survey mirror"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let summary = runtime.block_on(async {
        let feed = JsonLinesFeed::open(&records)?;
        let pipeline = Pipeline::new(pipeline_config)?;
        let summary = pipeline.run(feed).await?;
        Ok::<_, CliError>(summary)
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::Config(format!("Failed to encode summary: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

/// Applies CLI overrides on top of the file settings.
fn resolve_pipeline_config(config: &ConfigFile, args: &RunArgs) -> Result<PipelineConfig, CliError> {
    let mut config = config.clone();

    if let Some(n) = args.transfer {
        config.queues.transfer = n;
    }
    if let Some(n) = args.liberation {
        config.queues.liberation = n;
    }
    if let Some(n) = args.transform {
        config.queues.transform = n;
    }
    if let Some(n) = args.workers {
        config.worker_threads = Some(n);
    }
    if let Some(tool) = &args.tool {
        config.liberation.tool = tool.clone();
    }

    Ok(config.pipeline_config()?)
}
