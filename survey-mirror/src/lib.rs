//! Survey Mirror - resource-dependency pipeline for aerial survey archives
//!
//! Mirrors derived survey products (liberated point clouds, height grids,
//! orthophotos) for the catalogue tiles that fall inside configured regions.
//! Each product is described by a [`recipe::Recipe`] whose source may itself
//! be the output of another recipe; the [`pipeline::Pipeline`] walks those
//! dependency chains, deduplicating shared outputs and skipping anything
//! already on disk.
//!
//! # Example
//!
//! ```no_run
//! use survey_mirror::catalogue::JsonLinesFeed;
//! use survey_mirror::config::ConfigFile;
//! use survey_mirror::pipeline::Pipeline;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load()?;
//! let pipeline = Pipeline::new(config.pipeline_config()?)?;
//! let feed = JsonLinesFeed::open("records.jsonl".as_ref())?;
//! let summary = pipeline.run(feed).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod catalogue;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fsutil;
pub mod grid;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod recipe;
pub mod region;
pub mod stages;
pub mod status;
pub mod task;
pub mod template;
pub mod workers;

pub use error::{PipelineError, StageError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig};
pub use status::RunSummary;
