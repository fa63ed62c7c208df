//! Recipes command - show the resolved recipe trees.

use std::path::Path;

use survey_mirror::recipe::Recipe;

use super::load_config;
use crate::error::CliError;

/// Run the recipes command.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let trees = config.recipe_trees()?;

    if trees.is_empty() {
        println!("No recipes configured.");
        return Ok(());
    }

    for recipe in &trees {
        println!("{}", chain_line(recipe));
        let mut current = Some(recipe);
        while let Some(step) = current {
            println!(
                "  {:<8} {:<10} -> {}",
                step.name(),
                step.operation().key(),
                step.drain()
            );
            if step.delete_source_after_use() {
                println!("  {:<8} deletes its source after use", "");
            }
            current = step.dependency();
        }
        println!();
    }
    Ok(())
}

/// Formats a chain as `laz <- zlas`.
fn chain_line(recipe: &Recipe) -> String {
    let mut names = vec![recipe.name()];
    let mut current = recipe.dependency();
    while let Some(step) = current {
        names.push(step.name());
        current = step.dependency();
    }
    names.join(" <- ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_mirror::recipe::Source;

    #[test]
    fn test_chain_line() {
        let zlas = Recipe::new("zlas", Source::Literal("{remote}x.zlas".into()), "{local}x.zlas");
        let laz = Recipe::new("laz", Source::Derived(Box::new(zlas)), "{local}x.laz");
        assert_eq!(chain_line(&laz), "laz <- zlas");
    }
}
