//! Regions command - list configured areas of interest.

use std::path::Path;

use super::load_config;
use crate::error::CliError;

/// Run the regions command.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    if config.regions.is_empty() {
        println!("No regions configured.");
        return Ok(());
    }

    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12}",
        "region", "min x", "min y", "max x", "max y"
    );
    for region in &config.regions {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            region.name, region.min_x, region.min_y, region.max_x, region.max_y
        );
    }
    Ok(())
}
