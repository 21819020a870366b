//! Declarative target and provider definitions loaded from `fruitconfig.yaml`.
//!
//! ```yaml
//! targets:
//!   build:
//!     description: Build everything
//!     steps:
//!       - name: compile
//!         run: cargo build
//!       - run: cargo doc
//!         allow_failure: true
//!         skip_unless: test -d docs
//!       - target: lint
//!   lint:
//!     steps:
//!       - run: cargo clippy
//! providers:
//!   version:
//!     value: "1.0.0"
//! ```
//!
//! Shell commands run through [`fruit_util::shell`] with the directory of the
//! configuration file as working directory.

use std::{
    collections::HashSet,
    env, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::bail;
use fruit_util::{expand_tilde, path_processing::parent_dir, run_captured, run_streaming};
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    error::{EntryKind, GardenError, validate_name},
    garden::Garden,
    provider::Provider,
    signal::{StepResult, abort, fail, skip},
    target::Target,
};

pub const CONFIG_FILE_NAME: &str = "fruitconfig.yaml";
pub const ALT_CONFIG_FILE_NAME: &str = "fruitconfig.yml";
/// Environment variable overriding the default configuration location.
pub const CONFIG_PATH_ENV: &str = "FRUITCONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {} or {} found at {}", CONFIG_FILE_NAME, ALT_CONFIG_FILE_NAME, .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    /// `index` is 1-based, matching the order steps are listed in the file.
    #[error("target '{target}', step {index}: {reason}")]
    InvalidStep { target: String, index: usize, reason: String },
    #[error("provider '{provider}': {reason}")]
    InvalidProvider { provider: String, reason: String },
    #[error("recursive target chain: {}", cycle.join(" -> "))]
    RecursiveTarget { cycle: Vec<String> },
    #[error(transparent)]
    Registration(#[from] GardenError),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FruitConfig {
    #[serde(default)]
    pub targets: IndexMap<String, TargetConfig>,
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One entry of a target's `steps` list: either a shell command (`run`) or a
/// nested target invocation (`target`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Defaults to the command text.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    /// Report a non-zero exit as a failed step instead of aborting the run.
    #[serde(default)]
    pub allow_failure: bool,
    /// Command checked before `run`; a non-zero exit skips the step.
    #[serde(default)]
    pub skip_unless: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Command whose trimmed stdout is the provider result.
    #[serde(default)]
    pub run: Option<String>,
}

/// A parsed and validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    /// Working directory for shell steps and providers.
    pub base_dir: PathBuf,
    pub config: FruitConfig,
}

impl FruitConfig {
    /// Parses a YAML document. An empty document is an empty configuration.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "configuration")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Checks the structural rules a YAML schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.providers.keys() {
            validate_name("provider name", name)?;
        }
        for name in self.targets.keys() {
            validate_name("target name", name)?;
        }

        for (name, provider) in &self.providers {
            if provider.value.is_some() == provider.run.is_some() {
                return Err(ConfigError::InvalidProvider {
                    provider: name.clone(),
                    reason: "exactly one of `value` and `run` is required".to_string(),
                });
            }
        }

        for (name, target) in &self.targets {
            for (index, step) in target.steps.iter().enumerate() {
                let invalid = |reason: String| ConfigError::InvalidStep {
                    target: name.clone(),
                    index: index + 1,
                    reason,
                };
                match (&step.run, &step.target) {
                    (Some(command), None) => {
                        if command.trim().is_empty() {
                            return Err(invalid("`run` must not be empty".to_string()));
                        }
                        if step.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
                            return Err(invalid("`name` must not be empty".to_string()));
                        }
                    }
                    (None, Some(nested)) => {
                        if !self.targets.contains_key(nested) {
                            return Err(invalid(format!("unknown target '{nested}'")));
                        }
                        if step.name.is_some() || step.allow_failure || step.skip_unless.is_some() {
                            return Err(invalid(
                                "`name`, `allow_failure` and `skip_unless` only apply to `run` steps".to_string(),
                            ));
                        }
                    }
                    _ => return Err(invalid("exactly one of `run` and `target` is required".to_string())),
                }
            }
        }

        let mut finished = HashSet::new();
        for name in self.targets.keys() {
            self.visit(name, &mut Vec::new(), &mut finished)?;
        }
        Ok(())
    }

    /// Depth-first walk over nested target references, rejecting cycles.
    fn visit<'a>(&'a self, name: &'a str, path: &mut Vec<&'a str>, finished: &mut HashSet<&'a str>) -> Result<(), ConfigError> {
        if finished.contains(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|entry| *entry == name) {
            let mut cycle: Vec<String> = path[start..].iter().map(|entry| entry.to_string()).collect();
            cycle.push(name.to_string());
            return Err(ConfigError::RecursiveTarget { cycle });
        }
        path.push(name);
        if let Some(target) = self.targets.get(name) {
            for nested in target.steps.iter().filter_map(|step| step.target.as_deref()) {
                self.visit(nested, path, finished)?;
            }
        }
        path.pop();
        finished.insert(name);
        Ok(())
    }

    /// Registers every provider and target into `garden`.
    ///
    /// Either everything is registered or nothing is: names already taken in
    /// `garden` are reported before the first insertion.
    pub fn register(&self, garden: &mut Garden, base_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(taken) = garden.providers().find(|provider| self.providers.contains_key(provider.name())) {
            return Err(GardenError::DuplicateName {
                kind: EntryKind::Provider,
                name: taken.name().to_string(),
            }
            .into());
        }
        if let Some(taken) = garden.targets().find(|target| self.targets.contains_key(target.name())) {
            return Err(GardenError::DuplicateName {
                kind: EntryKind::Target,
                name: taken.name().to_string(),
            }
            .into());
        }

        let providers = self
            .providers
            .iter()
            .map(|(name, provider)| provider.to_provider(name, base_dir))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = self
            .targets
            .iter()
            .map(|(name, target)| target.to_target(name, base_dir))
            .collect::<Result<Vec<_>, _>>()?;
        for provider in providers {
            garden.add_provider(provider)?;
        }
        for target in targets {
            garden.add_target(target)?;
        }
        debug!(
            targets = self.targets.len(),
            providers = self.providers.len(),
            "configuration registered"
        );
        Ok(())
    }
}

impl ProviderConfig {
    fn to_provider(&self, name: &str, base_dir: &Path) -> Result<Provider, GardenError> {
        match (&self.value, &self.run) {
            (Some(value), _) => {
                let value = value.clone();
                Provider::new(name, self.description.clone(), move || Ok(value.clone()))
            }
            (None, command) => {
                let command = command.clone().unwrap_or_default();
                let working_dir = base_dir.to_path_buf();
                Provider::new(name, self.description.clone(), move || {
                    let output = run_captured(&command, &working_dir)?;
                    if !output.success() {
                        bail!("`{command}` exited with status {}: {}", output.code, output.stderr.trim());
                    }
                    Ok(output.stdout.trim().to_string())
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ConfiguredStep {
    Shell(ShellStep),
    Target(String),
}

#[derive(Debug, Clone)]
struct ShellStep {
    name: String,
    description: String,
    command: String,
    allow_failure: bool,
    skip_unless: Option<String>,
    working_dir: PathBuf,
}

impl ShellStep {
    fn execute(&self) -> StepResult {
        if let Some(condition) = &self.skip_unless {
            let output = run_captured(condition, &self.working_dir)?;
            if !output.success() {
                return skip(format!("condition `{condition}` not met"));
            }
        }
        match run_streaming(&self.command, &self.working_dir)? {
            0 => Ok(()),
            code if self.allow_failure => fail(format!("`{}` exited with status {code}", self.command)),
            code => abort(format!("`{}` exited with status {code}", self.command)),
        }
    }
}

impl TargetConfig {
    fn to_target(&self, name: &str, base_dir: &Path) -> Result<Target, GardenError> {
        let steps: Rc<[ConfiguredStep]> = self
            .steps
            .iter()
            .map(|step| match (&step.run, &step.target) {
                (Some(command), _) => ConfiguredStep::Shell(ShellStep {
                    name: step.name.clone().unwrap_or_else(|| command.clone()),
                    description: step.description.clone(),
                    command: command.clone(),
                    allow_failure: step.allow_failure,
                    skip_unless: step.skip_unless.clone(),
                    working_dir: base_dir.to_path_buf(),
                }),
                (None, nested) => ConfiguredStep::Target(nested.clone().unwrap_or_default()),
            })
            .collect();

        Target::new(name, self.description.clone(), move |garden| {
            for step in steps.iter() {
                match step {
                    ConfiguredStep::Shell(shell) => {
                        garden.step(&shell.name, &shell.description, |_| shell.execute())?;
                    }
                    ConfiguredStep::Target(nested) => {
                        garden.call_target(nested)?;
                    }
                }
            }
            Ok(())
        })
    }
}

/// Location used when no path is given: `$FRUITCONFIG_PATH`, else `.`.
pub fn default_config_path() -> PathBuf {
    match env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => expand_tilde(&path),
        _ => PathBuf::from("."),
    }
}

/// Resolves a file or directory to the configuration file to load.
pub fn resolve_config_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_dir() {
        return [CONFIG_FILE_NAME, ALT_CONFIG_FILE_NAME]
            .iter()
            .map(|file_name| path.join(file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    Err(ConfigError::NotFound(path.to_path_buf()))
}

/// Reads, parses and validates the configuration at `path`.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let path = resolve_config_path(path)?;
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = FruitConfig::parse(&content, &path.display().to_string())?;
    config.validate()?;
    info!(path = %path.display(), targets = config.targets.len(), "configuration loaded");
    Ok(LoadedConfig {
        base_dir: parent_dir(&path),
        path,
        config,
    })
}

/// Loads the configuration at `path` and registers it into `garden`.
pub fn load_into(garden: &mut Garden, path: &Path) -> Result<LoadedConfig, ConfigError> {
    let loaded = load_config(path)?;
    loaded.config.register(garden, &loaded.base_dir)?;
    Ok(loaded)
}
