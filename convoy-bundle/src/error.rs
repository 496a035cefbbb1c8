use crate::check::UnmetDependency;
use std::fmt;
use thiserror::Error;

/// Failures while reading a bundle directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("bundle directory not found: {path}")]
    NotFound { path: String },

    #[error("{path}: no Bundle.yaml found")]
    MissingMetadata { path: String },

    #[error("io error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

/// Which step of the fetch, reload and verify cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Fetch,
    Reload,
    /// The update ran but the reloaded bundle still has unmet dependencies.
    Verify,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStage::Fetch => f.write_str("fetching dependencies"),
            FetchStage::Reload => f.write_str("reloading bundle after dependency update"),
            FetchStage::Verify => f.write_str("verifying dependencies after update"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DependencyError {
    /// Declared dependencies are missing or out of range and updating was not allowed.
    #[error("unmet dependencies in charts/ directory: {}", format_unmet(.unmet))]
    Unsatisfied { unmet: Vec<UnmetDependency> },

    #[error("failed {stage}: {source:#}")]
    Fetch {
        stage: FetchStage,
        #[source]
        source: anyhow::Error,
    },
}

impl DependencyError {
    /// Names of the unmet entries, empty for fetch failures.
    pub fn unmet_names(&self) -> Vec<&str> {
        match self {
            DependencyError::Unsatisfied { unmet } => unmet.iter().map(|u| u.name.as_str()).collect(),
            DependencyError::Fetch { .. } => vec![],
        }
    }
}

pub(crate) fn format_unmet(unmet: &[UnmetDependency]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
