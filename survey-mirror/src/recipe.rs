//! Resource recipes.
//!
//! A [`Recipe`] describes one resource type: where its input comes from, where
//! its output goes, and which stage queue turns the former into the latter.
//! The input is either a template ([`Source::Literal`]) or the output of
//! another recipe ([`Source::Derived`]), which makes the recipe set a shallow,
//! static tree.
//!
//! ```text
//! laz  (liberation) ◄── zlas (transfer) ◄── remote archive
//! bdmr (transform)  ◄── dmr  (transfer) ◄── remote archive
//! map  (transfer)   ◄── remote map export
//! ```

use std::fmt;
use std::str::FromStr;

/// Maximum nesting depth of derived recipes.
pub const MAX_RECIPE_DEPTH: usize = 4;

/// Where a recipe's input comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A URL or path template rendered against the task's params.
    Literal(String),
    /// The drain of another recipe instantiated for the same record.
    Derived(Box<Recipe>),
}

/// The stage operation that produces a recipe's drain from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// Fetch over the network or copy from the filesystem.
    #[default]
    Transfer,
    /// Decompress with the external liberation tool.
    Liberate,
    /// Re-encode a terrain point file as a binary grid on the worker pool.
    GridTransform,
}

impl Operation {
    /// All operations, in queue display order.
    pub const ALL: [Operation; 3] = [
        Operation::Transfer,
        Operation::Liberate,
        Operation::GridTransform,
    ];

    /// Configuration name of the operation's queue.
    pub fn key(&self) -> &'static str {
        match self {
            Operation::Transfer => "transfer",
            Operation::Liberate => "liberation",
            Operation::GridTransform => "transform",
        }
    }

    /// Noun used in log lines ("download required").
    pub fn noun(&self) -> &'static str {
        match self {
            Operation::Transfer => "download",
            Operation::Liberate => "liberation",
            Operation::GridTransform => "grid encoding",
        }
    }

    /// Progressive form ("downloading").
    pub fn verbing(&self) -> &'static str {
        match self {
            Operation::Transfer => "downloading",
            Operation::Liberate => "liberating",
            Operation::GridTransform => "grid encoding",
        }
    }

    /// Past form ("downloaded").
    pub fn verbed(&self) -> &'static str {
        match self {
            Operation::Transfer => "downloaded",
            Operation::Liberate => "liberated",
            Operation::GridTransform => "grid encoded",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transfer" | "download" => Ok(Operation::Transfer),
            "liberation" | "liberate" => Ok(Operation::Liberate),
            "transform" | "grid" => Ok(Operation::GridTransform),
            other => Err(format!(
                "unknown queue '{}' (expected transfer, liberation or transform)",
                other
            )),
        }
    }
}

/// Static description of one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    name: String,
    source: Source,
    drain: String,
    operation: Operation,
    delete_source_after_use: bool,
}

impl Recipe {
    /// Creates a transfer recipe fetching `source` into `drain`.
    pub fn new(name: impl Into<String>, source: Source, drain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            drain: drain.into(),
            operation: Operation::default(),
            delete_source_after_use: false,
        }
    }

    /// Assigns the stage operation.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Deletes the (local) source once this recipe's drain is committed.
    pub fn with_delete_source(mut self, delete: bool) -> Self {
        self.delete_source_after_use = delete;
        self
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Returns the drain template.
    pub fn drain(&self) -> &str {
        &self.drain
    }

    /// Returns the stage operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns whether the source is deleted after a successful commit.
    pub fn delete_source_after_use(&self) -> bool {
        self.delete_source_after_use
    }

    /// Returns the nested recipe, if the source is derived.
    pub fn dependency(&self) -> Option<&Recipe> {
        match &self.source {
            Source::Derived(inner) => Some(inner),
            Source::Literal(_) => None,
        }
    }

    /// Number of recipe levels including this one.
    pub fn depth(&self) -> usize {
        1 + self.dependency().map_or(0, Recipe::depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zlas() -> Recipe {
        Recipe::new(
            "zlas",
            Source::Literal("{remote}TM_{name}.zlas".into()),
            "{mass_storage}TM_{name}.zlas",
        )
    }

    #[test]
    fn test_defaults_to_transfer() {
        let recipe = zlas();
        assert_eq!(recipe.operation(), Operation::Transfer);
        assert!(!recipe.delete_source_after_use());
        assert!(recipe.dependency().is_none());
        assert_eq!(recipe.depth(), 1);
    }

    #[test]
    fn test_derived_recipe() {
        let laz = Recipe::new("laz", Source::Derived(Box::new(zlas())), "laz/{name}.laz")
            .with_operation(Operation::Liberate)
            .with_delete_source(true);

        assert_eq!(laz.dependency().map(Recipe::name), Some("zlas"));
        assert_eq!(laz.depth(), 2);
        assert!(laz.delete_source_after_use());
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("transfer".parse::<Operation>(), Ok(Operation::Transfer));
        assert_eq!("Liberation".parse::<Operation>(), Ok(Operation::Liberate));
        assert_eq!(" transform ".parse::<Operation>(), Ok(Operation::GridTransform));
        assert!("teleport".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_labels() {
        assert_eq!(Operation::Transfer.noun(), "download");
        assert_eq!(Operation::Liberate.verbing(), "liberating");
        assert_eq!(Operation::GridTransform.verbed(), "grid encoded");
        assert_eq!(Operation::Liberate.to_string(), "liberation");
    }
}
