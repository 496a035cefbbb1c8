//! Clap-free settings for the deploy pipeline.

use convoy_bundle::RepositoryOptions;
use convoy_values::ValueOptions;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Environment-level settings. Can come from a config file and be overridden per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    pub namespace: String,

    /// Upper bound on waiting for convergence.
    pub timeout: Duration,

    // Behaviour
    pub atomic: bool,
    pub wait: bool,
    pub create_namespace: bool,
    pub dependency_update: bool,

    // Storage
    pub repositories: RepositoryOptions,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            timeout: DEFAULT_TIMEOUT,
            atomic: false,
            wait: false,
            create_namespace: false,
            dependency_update: false,
            repositories: RepositoryOptions::default(),
        }
    }
}

impl DeploySettings {
    /// Atomic deploys always wait, or there would be nothing to roll back on.
    pub fn effective_wait(&self) -> bool {
        self.wait || self.atomic
    }
}

/// One deploy call's input. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
    /// Positional `[RELEASE, BUNDLE]`.
    pub args: Vec<String>,

    /// Semver constraint on the bundle version. `None` takes the newest.
    pub version: Option<String>,

    pub values: ValueOptions,

    pub dry_run: bool,
    pub reuse_values: bool,
    pub reset_values: bool,

    /// Overrides the stored release description.
    pub description: Option<String>,
}

impl DeployRequest {
    pub fn new(release: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            args: vec![release.into(), bundle.into()],
            ..Default::default()
        }
    }
}
