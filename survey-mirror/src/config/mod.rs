//! Configuration file.
//!
//! Settings live in an INI file, by default at
//! `~/.config/survey-mirror/config.ini`:
//!
//! ```ini
//! [archive]
//! remote = http://gis.arso.gov.si/
//! local = /data/mirror/
//! mass_storage = /bulk/mirror/
//!
//! [queues]
//! transfer = 4
//! liberation = 6
//! transform = 12
//!
//! [region.Bled]
//! min_x = 427984.52
//! min_y = 133178.09
//! max_x = 433977.33
//! max_y = 138449.91
//!
//! [recipe.laz]
//! source = recipe:zlas
//! drain = {local}laz/{block}/TM_{name}.laz
//! queue = liberation
//! delete_source = true
//! ```
//!
//! A recipe whose `source` is `recipe:<other>` consumes the output of
//! `<other>`. Referenced recipes are nested into their consumers when the
//! recipe trees are built and are not scheduled on their own.
//!
//! CLI arguments override file values when specified.

mod defaults;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

pub use defaults::{
    default_recipes, default_regions, DEFAULT_LIBERATION_TOOL, DEFAULT_LOCAL, DEFAULT_MASS_STORAGE,
    DEFAULT_REMOTE, DEFAULT_TILE_SIZE,
};

use crate::pipeline::PipelineConfig;
use crate::queue::QueueLimits;
use crate::recipe::{Operation, Recipe, Source, MAX_RECIPE_DEPTH};
use crate::region::{Point, Region};
use crate::stages::liberation::{LiberationTool, DEFAULT_INDEX_EXTENSION};
use crate::stages::transfer::DEFAULT_TIMEOUT_SECS;
use crate::status::DEFAULT_REPORT_THRESHOLD;
use crate::workers::default_threads;

/// Prefix marking a recipe reference in a `source` value.
pub const RECIPE_REFERENCE_PREFIX: &str = "recipe:";

const REGION_SECTION_PREFIX: &str = "region.";
const RECIPE_SECTION_PREFIX: &str = "recipe.";

/// Errors loading or interpreting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("missing [{section}] {key}")]
    MissingField { section: String, key: String },

    #[error("recipe '{recipe}' references unknown recipe '{reference}'")]
    UnknownRecipe { recipe: String, reference: String },

    #[error("recipe cycle: {0}")]
    RecipeCycle(String),

    #[error("recipe '{recipe}' nests deeper than {max} levels")]
    RecipeTooDeep { recipe: String, max: usize },
}

/// Returns the configuration directory (`~/.config/survey-mirror`).
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("survey-mirror")
}

/// Returns the default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// `[archive]` roots, exposed to templates as `{remote}`, `{local}` and
/// `{mass_storage}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSettings {
    pub remote: String,
    pub local: String,
    pub mass_storage: String,
}

/// `[liberation]` tool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LiberationSettings {
    pub tool: PathBuf,
    pub index_extension: String,
}

/// One `[region.<name>]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSpec {
    pub name: String,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl RegionSpec {
    pub fn to_region(&self) -> Region {
        Region::new(
            self.name.clone(),
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.max_y),
        )
    }
}

/// One `[recipe.<name>]` section, before references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSpec {
    pub name: String,
    /// Template, or `recipe:<name>`.
    pub source: String,
    pub drain: String,
    pub operation: Operation,
    pub delete_source: bool,
}

impl RecipeSpec {
    /// Name of the referenced recipe, if `source` is a reference.
    pub fn reference(&self) -> Option<&str> {
        self.source
            .strip_prefix(RECIPE_REFERENCE_PREFIX)
            .map(str::trim)
    }
}

/// The complete configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub archive: ArchiveSettings,
    /// Extra `[vars]` template variables.
    pub vars: BTreeMap<String, String>,
    /// `[feed] records`: JSON-lines catalogue export.
    pub records: Option<PathBuf>,
    /// `[tiles] size`.
    pub tile_size: u32,
    pub queues: QueueLimits,
    /// `[workers] threads`; `None` uses available parallelism.
    pub worker_threads: Option<usize>,
    pub liberation: LiberationSettings,
    /// `[transfer] timeout`.
    pub transfer_timeout: Duration,
    /// `[report] threshold_ms`.
    pub report_threshold: Duration,
    /// `[logging] directory`.
    pub log_directory: Option<PathBuf>,
    pub regions: Vec<RegionSpec>,
    pub recipes: Vec<RecipeSpec>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            archive: ArchiveSettings {
                remote: DEFAULT_REMOTE.to_string(),
                local: DEFAULT_LOCAL.to_string(),
                mass_storage: DEFAULT_MASS_STORAGE.to_string(),
            },
            vars: BTreeMap::new(),
            records: None,
            tile_size: DEFAULT_TILE_SIZE,
            queues: QueueLimits::default(),
            worker_threads: None,
            liberation: LiberationSettings {
                tool: PathBuf::from(DEFAULT_LIBERATION_TOOL),
                index_extension: DEFAULT_INDEX_EXTENSION.to_string(),
            },
            transfer_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            report_threshold: DEFAULT_REPORT_THRESHOLD,
            log_directory: None,
            regions: default_regions(),
            recipes: default_recipes(),
        }
    }
}

impl ConfigFile {
    /// Loads the default configuration file, or the built-in defaults if it
    /// does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads a configuration file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses INI text. Sections that are absent keep their defaults; if the
    /// text defines any region or recipe, the built-in lists are replaced.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(props) = ini.section(Some("archive")) {
            if let Some(v) = props.get("remote") {
                config.archive.remote = v.to_string();
            }
            if let Some(v) = props.get("local") {
                config.archive.local = v.to_string();
            }
            if let Some(v) = props.get("mass_storage") {
                config.archive.mass_storage = v.to_string();
            }
        }

        if let Some(props) = ini.section(Some("vars")) {
            for (key, value) in props.iter() {
                config.vars.insert(key.to_string(), value.to_string());
            }
        }

        if let Some(props) = ini.section(Some("feed")) {
            config.records = props.get("records").map(PathBuf::from);
        }

        if let Some(props) = ini.section(Some("tiles")) {
            if let Some(size) = parse_value::<u32>(props, "tiles", "size")? {
                if size == 0 {
                    return Err(invalid("tiles", "size", "0", "must be positive"));
                }
                config.tile_size = size;
            }
        }

        if let Some(props) = ini.section(Some("queues")) {
            let queues = &mut config.queues;
            for (key, slot) in [
                ("initialize", &mut queues.initialize),
                ("dispatch", &mut queues.dispatch),
                ("finish", &mut queues.finish),
                ("transfer", &mut queues.transfer),
                ("liberation", &mut queues.liberation),
                ("transform", &mut queues.transform),
            ] {
                if let Some(limit) = parse_value::<usize>(props, "queues", key)? {
                    if limit == 0 {
                        return Err(invalid("queues", key, "0", "must be positive"));
                    }
                    *slot = limit;
                }
            }
        }

        if let Some(props) = ini.section(Some("workers")) {
            config.worker_threads = parse_value::<usize>(props, "workers", "threads")?;
        }

        if let Some(props) = ini.section(Some("liberation")) {
            if let Some(v) = props.get("tool") {
                config.liberation.tool = PathBuf::from(v);
            }
            if let Some(v) = props.get("index_extension") {
                config.liberation.index_extension = v.trim_start_matches('.').to_string();
            }
        }

        if let Some(props) = ini.section(Some("transfer")) {
            if let Some(secs) = parse_value::<u64>(props, "transfer", "timeout")? {
                config.transfer_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(props) = ini.section(Some("report")) {
            if let Some(ms) = parse_value::<u64>(props, "report", "threshold_ms")? {
                config.report_threshold = Duration::from_millis(ms);
            }
        }

        if let Some(props) = ini.section(Some("logging")) {
            config.log_directory = props.get("directory").map(PathBuf::from);
        }

        let mut regions = Vec::new();
        let mut recipes = Vec::new();
        for (section, props) in ini.iter() {
            let Some(section) = section else { continue };
            if let Some(name) = section.strip_prefix(REGION_SECTION_PREFIX) {
                regions.push(parse_region(section, name, props)?);
            } else if let Some(name) = section.strip_prefix(RECIPE_SECTION_PREFIX) {
                recipes.push(parse_recipe(section, name, props)?);
            }
        }
        if !regions.is_empty() {
            config.regions = regions;
        }
        if !recipes.is_empty() {
            config.recipes = recipes;
        }

        Ok(config)
    }

    /// Renders the configuration as INI text.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("archive"))
            .set("remote", self.archive.remote.as_str())
            .set("local", self.archive.local.as_str())
            .set("mass_storage", self.archive.mass_storage.as_str());

        if !self.vars.is_empty() {
            let mut section = ini.with_section(Some("vars"));
            for (key, value) in &self.vars {
                section.set(key.as_str(), value.as_str());
            }
        }

        if let Some(records) = &self.records {
            ini.with_section(Some("feed"))
                .set("records", records.display().to_string());
        }

        ini.with_section(Some("tiles"))
            .set("size", self.tile_size.to_string());

        ini.with_section(Some("queues"))
            .set("initialize", self.queues.initialize.to_string())
            .set("dispatch", self.queues.dispatch.to_string())
            .set("finish", self.queues.finish.to_string())
            .set("transfer", self.queues.transfer.to_string())
            .set("liberation", self.queues.liberation.to_string())
            .set("transform", self.queues.transform.to_string());

        if let Some(threads) = self.worker_threads {
            ini.with_section(Some("workers"))
                .set("threads", threads.to_string());
        }

        ini.with_section(Some("liberation"))
            .set("tool", self.liberation.tool.display().to_string())
            .set("index_extension", self.liberation.index_extension.as_str());

        ini.with_section(Some("transfer"))
            .set("timeout", self.transfer_timeout.as_secs().to_string());

        ini.with_section(Some("report"))
            .set("threshold_ms", self.report_threshold.as_millis().to_string());

        if let Some(dir) = &self.log_directory {
            ini.with_section(Some("logging"))
                .set("directory", dir.display().to_string());
        }

        for region in &self.regions {
            ini.with_section(Some(format!("{}{}", REGION_SECTION_PREFIX, region.name)))
                .set("min_x", region.min_x.to_string())
                .set("min_y", region.min_y.to_string())
                .set("max_x", region.max_x.to_string())
                .set("max_y", region.max_y.to_string());
        }

        for recipe in &self.recipes {
            ini.with_section(Some(format!("{}{}", RECIPE_SECTION_PREFIX, recipe.name)))
                .set("source", recipe.source.as_str())
                .set("drain", recipe.drain.as_str())
                .set("queue", recipe.operation.key())
                .set("delete_source", recipe.delete_source.to_string());
        }

        ini
    }

    /// Saves to the default configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Template variables from `[archive]` and `[vars]`.
    ///
    /// `[archive]` roots override `[vars]` entries of the same name.
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.vars.clone();
        vars.insert("remote".into(), self.archive.remote.clone());
        vars.insert("local".into(), self.archive.local.clone());
        vars.insert("mass_storage".into(), self.archive.mass_storage.clone());
        vars
    }

    /// Configured regions.
    pub fn region_list(&self) -> Vec<Arc<Region>> {
        self.regions
            .iter()
            .map(|spec| Arc::new(spec.to_region()))
            .collect()
    }

    /// Resolves recipe references into owned trees.
    ///
    /// Returns the top-level recipes (those no other recipe consumes), in
    /// file order. Every recipe is validated, including ones only reachable
    /// through a cycle.
    pub fn recipe_trees(&self) -> Result<Vec<Recipe>, ConfigError> {
        let by_name: HashMap<&str, &RecipeSpec> = self
            .recipes
            .iter()
            .map(|spec| (spec.name.as_str(), spec))
            .collect();
        let referenced: HashSet<&str> = self.recipes.iter().filter_map(RecipeSpec::reference).collect();

        let mut trees = Vec::new();
        for spec in &self.recipes {
            let tree = build_recipe(spec, &by_name, &mut Vec::new())?;
            if !referenced.contains(spec.name.as_str()) {
                trees.push(tree);
            }
        }
        Ok(trees)
    }

    /// Builds the pipeline settings.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        Ok(PipelineConfig {
            recipes: self.recipe_trees()?,
            regions: self.region_list(),
            tile_size: self.tile_size,
            vars: self.template_vars(),
            queues: self.queues,
            workers: self.worker_threads.unwrap_or_else(default_threads),
            report_threshold: self.report_threshold,
            transfer_timeout: self.transfer_timeout,
            liberation: LiberationTool::new(&self.liberation.tool)
                .with_index_extension(self.liberation.index_extension.as_str()),
        })
    }
}

fn build_recipe<'a>(
    spec: &'a RecipeSpec,
    by_name: &HashMap<&str, &'a RecipeSpec>,
    chain: &mut Vec<&'a str>,
) -> Result<Recipe, ConfigError> {
    if chain.contains(&spec.name.as_str()) {
        let mut names: Vec<&str> = chain.clone();
        names.push(&spec.name);
        return Err(ConfigError::RecipeCycle(names.join(" -> ")));
    }
    if chain.len() >= MAX_RECIPE_DEPTH {
        return Err(ConfigError::RecipeTooDeep {
            recipe: chain.first().copied().unwrap_or(&spec.name).to_string(),
            max: MAX_RECIPE_DEPTH,
        });
    }

    chain.push(&spec.name);
    let source = match spec.reference() {
        Some(reference) => {
            let inner = by_name
                .get(reference)
                .copied()
                .ok_or_else(|| ConfigError::UnknownRecipe {
                    recipe: spec.name.clone(),
                    reference: reference.to_string(),
                })?;
            Source::Derived(Box::new(build_recipe(inner, by_name, chain)?))
        }
        None => Source::Literal(spec.source.clone()),
    };
    chain.pop();

    Ok(Recipe::new(spec.name.clone(), source, spec.drain.clone())
        .with_operation(spec.operation)
        .with_delete_source(spec.delete_source))
}

fn invalid(section: &str, key: &str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T>(props: &Properties, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match props.get(key).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(section, key, value, e)),
    }
}

fn require<T>(props: &Properties, section: &str, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(props, section, key)?.ok_or_else(|| ConfigError::MissingField {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn parse_region(section: &str, name: &str, props: &Properties) -> Result<RegionSpec, ConfigError> {
    let spec = RegionSpec {
        name: name.trim().to_string(),
        min_x: require(props, section, "min_x")?,
        min_y: require(props, section, "min_y")?,
        max_x: require(props, section, "max_x")?,
        max_y: require(props, section, "max_y")?,
    };
    if spec.min_x > spec.max_x || spec.min_y > spec.max_y {
        return Err(invalid(section, "min_x", &spec.min_x.to_string(), "minimum exceeds maximum"));
    }
    Ok(spec)
}

fn parse_recipe(section: &str, name: &str, props: &Properties) -> Result<RecipeSpec, ConfigError> {
    let text = |key: &str| -> Result<String, ConfigError> {
        props
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                section: section.to_string(),
                key: key.to_string(),
            })
    };

    let operation = match props.get("queue").map(str::trim) {
        None | Some("") => Operation::default(),
        Some(value) => value
            .parse::<Operation>()
            .map_err(|e| invalid(section, "queue", value, e))?,
    };

    Ok(RecipeSpec {
        name: name.trim().to_string(),
        source: text("source")?,
        drain: text("drain")?,
        operation,
        delete_source: parse_value::<bool>(props, section, "delete_source")?.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_recipe_trees() {
        let trees = ConfigFile::default().recipe_trees().unwrap();
        let names: Vec<&str> = trees.iter().map(Recipe::name).collect();
        assert_eq!(names, vec!["laz", "bdmr", "map"]);

        let laz = &trees[0];
        assert_eq!(laz.operation(), Operation::Liberate);
        assert!(laz.delete_source_after_use());
        assert_eq!(laz.dependency().map(Recipe::name), Some("zlas"));
        assert_eq!(trees[1].operation(), Operation::GridTransform);
        assert_eq!(trees[2].depth(), 1);
    }

    #[test]
    fn test_default_regions() {
        let config = ConfigFile::default();
        assert_eq!(config.regions.len(), 10);
        assert_eq!(config.region_list()[0].name(), "Ljubljana");
    }

    #[test]
    fn test_parse_overrides_defaults() {
        let config = ConfigFile::parse(
            "[archive]\nremote = http://mirror.test/\n\n\
             [queues]\ntransfer = 2\n\n\
             [report]\nthreshold_ms = 50\n\n\
             [vars]\nproject = gkot\n",
        )
        .unwrap();

        assert_eq!(config.archive.remote, "http://mirror.test/");
        assert_eq!(config.archive.local, DEFAULT_LOCAL);
        assert_eq!(config.queues.transfer, 2);
        assert_eq!(config.queues.liberation, 6);
        assert_eq!(config.report_threshold, Duration::from_millis(50));

        let vars = config.template_vars();
        assert_eq!(vars.get("project").map(String::as_str), Some("gkot"));
        assert_eq!(vars.get("remote").map(String::as_str), Some("http://mirror.test/"));
    }

    #[test]
    fn test_parse_regions_and_recipes_replace_defaults() {
        let config = ConfigFile::parse(
            "[region.Test]\nmin_x = 0\nmin_y = 0\nmax_x = 10\nmax_y = 10\n\n\
             [recipe.tiles]\nsource = {remote}{name}.png\ndrain = out/{name}.png\n",
        )
        .unwrap();

        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.regions[0].name, "Test");
        assert_eq!(config.recipes.len(), 1);
        assert_eq!(config.recipes[0].operation, Operation::Transfer);
        assert!(!config.recipes[0].delete_source);
    }

    #[test]
    fn test_invalid_queue_limit() {
        let err = ConfigFile::parse("[queues]\ntransfer = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "transfer"));

        let err = ConfigFile::parse("[queues]\nliberation = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_region_missing_field() {
        let err = ConfigFile::parse("[region.Half]\nmin_x = 0\nmin_y = 0\nmax_x = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref key, .. } if key == "max_y"));
    }

    #[test]
    fn test_recipe_unknown_queue() {
        let err = ConfigFile::parse("[recipe.x]\nsource = a\ndrain = b\nqueue = teleport\n").unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_unknown_recipe_reference() {
        let config =
            ConfigFile::parse("[recipe.laz]\nsource = recipe:zlas\ndrain = laz/{name}.laz\n").unwrap();
        let err = config.recipe_trees().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRecipe { ref reference, .. } if reference == "zlas"));
    }

    #[test]
    fn test_recipe_cycle() {
        let config = ConfigFile::parse(
            "[recipe.a]\nsource = recipe:b\ndrain = a\n\n[recipe.b]\nsource = recipe:a\ndrain = b\n",
        )
        .unwrap();
        let err = config.recipe_trees().unwrap_err();
        assert!(matches!(err, ConfigError::RecipeCycle(ref chain) if chain == "a -> b -> a"));
    }

    #[test]
    fn test_recipe_too_deep() {
        let mut text = String::new();
        for i in 0..=MAX_RECIPE_DEPTH {
            let source = if i == MAX_RECIPE_DEPTH {
                "http://x".to_string()
            } else {
                format!("recipe:r{}", i + 1)
            };
            text.push_str(&format!("[recipe.r{}]\nsource = {}\ndrain = d{}\n\n", i, source, i));
        }
        let config = ConfigFile::parse(&text).unwrap();
        assert!(matches!(
            config.recipe_trees(),
            Err(ConfigError::RecipeTooDeep { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.records = Some(PathBuf::from("/data/index.jsonl"));
        config.worker_threads = Some(3);
        config.vars.insert("project".into(), "gkot".into());
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load_from(Path::new("/nonexistent/config.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_pipeline_config() {
        let mut config = ConfigFile::default();
        config.worker_threads = Some(2);
        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.workers, 2);
        assert_eq!(pipeline.recipes.len(), 3);
        assert_eq!(pipeline.tile_size, 1000);
        assert!(pipeline.vars.contains_key("mass_storage"));
        assert_eq!(pipeline.liberation.program(), Path::new("lasliberate"));
        assert_eq!(pipeline.liberation.index_extension(), "lax");
        assert_eq!(pipeline.transfer_timeout, Duration::from_secs(300));
    }
}
