//! Configuration file loading for convoy.
//!
//! Discovers and loads `convoy.toml` from the working directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use crate::duration::parse_duration;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use convoy_core::{DEFAULT_TIMEOUT, DeploySettings, RepositoryOptions};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "convoy.toml";

/// Where release records live when neither the config nor the CLI says otherwise.
pub const DEFAULT_STATE_DIR: &str = ".convoy/releases";

/// Top-level configuration from convoy.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConvoyConfig {
    /// Defaults for every deploy.
    pub deploy: DeployConfig,

    /// Storage locations.
    pub paths: PathsConfig,

    /// Repository alias → directory holding `<name>-<version>` bundles.
    pub repositories: BTreeMap<String, Utf8PathBuf>,
}

/// Deploy section of the config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub namespace: Option<String>,

    /// Same syntax as `--timeout`.
    pub timeout: Option<String>,

    pub atomic: bool,
    pub wait: bool,
    pub create_namespace: bool,
    pub dependency_update: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub state_dir: Option<Utf8PathBuf>,
    pub repository_cache: Option<Utf8PathBuf>,
}

impl ConvoyConfig {
    /// Make relative paths relative to `base` (the directory holding the config file).
    pub fn resolve_paths(mut self, base: &Utf8Path) -> Self {
        let anchor = |p: Utf8PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.paths.state_dir = self.paths.state_dir.map(anchor);
        self.paths.repository_cache = self.paths.repository_cache.map(anchor);
        self.repositories = self
            .repositories
            .into_iter()
            .map(|(alias, dir)| (alias, anchor(dir)))
            .collect();
        self
    }
}

/// Discover the convoy.toml config file in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a convoy.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<ConvoyConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    let config =
        parse_config(&contents).with_context(|| format!("parse config file {}", path))?;
    let base = path.parent().unwrap_or(Utf8Path::new("."));
    Ok(config.resolve_paths(base))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<ConvoyConfig> {
    let config: ConvoyConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return default if not found.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<ConvoyConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(ConvoyConfig::default()),
    }
}

/// Deploy flags as given on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct DeployOverrides {
    pub namespace: Option<String>,
    pub timeout: Option<String>,
    pub atomic: bool,
    pub wait: bool,
    pub create_namespace: bool,
    pub dependency_update: bool,
    pub state_dir: Option<Utf8PathBuf>,
    pub repository_cache: Option<Utf8PathBuf>,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub settings: DeploySettings,

    /// Root of the release store.
    pub state_dir: Utf8PathBuf,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: ConvoyConfig,
}

impl ConfigMerger {
    /// Create a new merger from a loaded config.
    pub fn new(config: ConvoyConfig) -> Self {
        Self { config }
    }

    /// Merge with deploy command CLI arguments.
    ///
    /// Scalar CLI values replace config values. CLI boolean flags turn a setting on
    /// but cannot turn off one the config enables.
    pub fn merge_deploy_args(self, cli: &DeployOverrides) -> anyhow::Result<MergedConfig> {
        let deploy = self.config.deploy;

        let timeout = match cli.timeout.as_ref().or(deploy.timeout.as_ref()) {
            Some(raw) => parse_duration(raw).map_err(anyhow::Error::msg)?,
            None => DEFAULT_TIMEOUT,
        };

        let namespace = cli
            .namespace
            .clone()
            .or(deploy.namespace)
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DeploySettings::default().namespace);

        let repositories = RepositoryOptions {
            repositories: self.config.repositories,
            cache_dir: cli
                .repository_cache
                .clone()
                .or(self.config.paths.repository_cache),
        };

        let state_dir = cli
            .state_dir
            .clone()
            .or(self.config.paths.state_dir)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STATE_DIR));

        Ok(MergedConfig {
            settings: DeploySettings {
                namespace,
                timeout,
                atomic: cli.atomic || deploy.atomic,
                wait: cli.wait || deploy.wait,
                create_namespace: cli.create_namespace || deploy.create_namespace,
                dependency_update: cli.dependency_update || deploy.dependency_update,
                repositories,
            },
            state_dir,
        })
    }
}
