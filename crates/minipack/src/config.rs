//! Configuration loading
//!
//! Settings are layered, later layers overriding earlier ones:
//! 1. built-in defaults
//! 2. user configuration (`<config dir>/minipack/minipack.toml`)
//! 3. project configuration (`minipack.toml` in the working directory, or an
//!    explicit `--config` file)
//! 4. `MINIPACK_*` environment variables
//! 5. command-line flags (applied by the binary)
//!
//! TOML layers are merged table by table, so a project file only needs to
//! mention the keys it changes. Arrays (such as `module.rules`) are replaced,
//! not concatenated.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    dirs,
    error::BuildError,
    loader::{LoaderPipeline, MatchRule, RuleTest, builtin},
};

/// File name looked up in the working directory and the user config dir
pub const CONFIG_FILE_NAME: &str = "minipack.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root; module ids are relative to it
    pub context: PathBuf,
    /// Entry module, absolute or relative to `context`
    pub entry: PathBuf,
    /// Chunk name, substituted for `[name]` in the output filename
    pub name: String,
    pub output: OutputConfig,
    pub resolve: ResolveConfig,
    pub module: ModuleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            entry: PathBuf::from("./example/entry.js"),
            name: "main".to_owned(),
            output: OutputConfig::default(),
            resolve: ResolveConfig::default(),
            module: ModuleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the bundle is written to
    pub path: PathBuf,
    /// File name template; supports `[name]`, `[hash]` and `[hash:N]`
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dist"),
            filename: "[name].js".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Suffixes tried, in order, when a specifier does not name a file exactly
    pub extensions: Vec<String>,
    /// Bare specifiers left as runtime `require` calls
    pub externals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    pub rules: Vec<RuleConfig>,
}

/// One `[[module.rules]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Regular expression tested against the module id
    pub test: String,
    /// Loaders, applied last to first
    #[serde(rename = "use")]
    pub loaders: Vec<LoaderConfig>,
}

/// A loader reference: either a bare name or a name with options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoaderConfig {
    Name(String),
    WithOptions {
        loader: String,
        #[serde(default)]
        options: toml::Table,
    },
}

impl LoaderConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::WithOptions { loader: name, .. } => name,
        }
    }

    fn options(&self) -> Option<&toml::Table> {
        match self {
            Self::Name(_) => None,
            Self::WithOptions { options, .. } => Some(options),
        }
    }
}

impl Config {
    /// Load the layered configuration. `explicit` replaces the project-level
    /// `minipack.toml` lookup and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut merged = toml::Table::new();

        if let Some(user_file) = dirs::user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
            && user_file.is_file()
        {
            debug!("Loading user config from {}", user_file.display());
            merge_tables(&mut merged, read_table(&user_file)?);
        }

        match explicit {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                merge_tables(&mut merged, read_table(path)?);
            }
            None => {
                let project_file = PathBuf::from(CONFIG_FILE_NAME);
                if project_file.is_file() {
                    debug!("Loading project config from {}", project_file.display());
                    merge_tables(&mut merged, read_table(&project_file)?);
                }
            }
        }

        let mut config: Self = toml::Value::Table(merged)
            .try_into()
            .context("Configuration does not match the expected schema")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a single TOML document on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `MINIPACK_*` overrides using `lookup` to read variables
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(context) = lookup("MINIPACK_CONTEXT") {
            self.context = PathBuf::from(context);
        }
        if let Some(entry) = lookup("MINIPACK_ENTRY") {
            self.entry = PathBuf::from(entry);
        }
        if let Some(path) = lookup("MINIPACK_OUTPUT_PATH") {
            self.output.path = PathBuf::from(path);
        }
        if let Some(filename) = lookup("MINIPACK_OUTPUT_FILENAME") {
            self.output.filename = filename;
        }
    }

    /// Compile `module.rules` into a loader pipeline using the built-in
    /// loader registry.
    pub fn loader_pipeline(&self) -> Result<LoaderPipeline, BuildError> {
        let mut pipeline = LoaderPipeline::new();

        for (rule_index, rule) in self.module.rules.iter().enumerate() {
            let pattern = Regex::new(&rule.test).map_err(|err| {
                BuildError::Config(format!(
                    "module.rules[{rule_index}].test `{}` is not a valid regex: {err}",
                    rule.test
                ))
            })?;

            let mut match_rule = MatchRule::new(RuleTest::Regex(pattern));
            for loader in &rule.loaders {
                let empty = toml::Table::new();
                let options = loader.options().unwrap_or(&empty);
                let built = builtin::create(loader.name(), options).map_err(|err| {
                    BuildError::Config(format!("module.rules[{rule_index}]: {err:#}"))
                })?;
                match_rule = match_rule.with_boxed_loader(built);
            }
            pipeline.push(match_rule);
        }

        Ok(pipeline)
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Recursively merge `overlay` into `base`; tables merge, everything else
/// is replaced.
pub(crate) fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
