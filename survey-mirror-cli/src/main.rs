//! Survey Mirror CLI - Command-line interface
//!
//! Mirrors derived survey products for the catalogue tiles inside the
//! configured regions.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "survey-mirror")]
#[command(version, about = "Mirror aerial survey tiles from a remote archive", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/survey-mirror/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a catalogue feed
    Run {
        /// JSON-lines catalogue export (overrides [feed] records)
        #[arg(long)]
        records: Option<PathBuf>,

        /// Concurrent transfers
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        transfer: Option<usize>,

        /// Concurrent liberation tool runs
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        liberation: Option<usize>,

        /// Concurrent grid transforms
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        transform: Option<usize>,

        /// Worker pool threads
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        workers: Option<usize>,

        /// Liberation tool executable
        #[arg(long)]
        tool: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the resolved recipe trees
    Recipes,

    /// List configured regions
    Regions,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            records,
            transfer,
            liberation,
            transform,
            workers,
            tool,
            json,
            verbose,
        } => commands::run::run(RunArgs {
            config: cli.config,
            verbose,
            records,
            transfer,
            liberation,
            transform,
            workers,
            tool,
            json,
        }),
        Commands::Init { force } => commands::init::run(cli.config.as_deref(), force),
        Commands::Recipes => commands::recipes::run(cli.config.as_deref()),
        Commands::Regions => commands::regions::run(cli.config.as_deref()),
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

fn exit_with(error: CliError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}
