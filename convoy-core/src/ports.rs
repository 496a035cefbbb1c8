//! Port traits abstracting the release backend and bundle storage away from the pipeline.

use camino::Utf8PathBuf;
use convoy_types::{Bundle, Release, Values};
use std::time::Duration;
use thiserror::Error;

pub use convoy_bundle::{BundleLoader, DependencyFetcher, RepositoryOptions};
pub use convoy_values::SourceReader;

/// Outcome of a release lookup that did not return a release.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The backend confirmed no revision exists under this name.
    #[error("release: not found")]
    NotFound,

    /// The lookup itself failed; existence is unknown.
    #[error("release backend unavailable: {0:#}")]
    Unavailable(#[source] anyhow::Error),
}

/// Read-only lookup of the latest revision of a release.
pub trait ReleaseProbe {
    fn probe_release(&self, namespace: &str, name: &str) -> Result<Release, ProbeError>;
}

/// Options threaded through to the execution layer unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub name: String,
    pub namespace: String,
    pub timeout: Duration,
    pub wait: bool,
    pub atomic: bool,
    pub create_namespace: bool,
    pub dry_run: bool,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Install found the name taken (possibly by a concurrent deploy).
    #[error("release already exists")]
    AlreadyExists,

    /// Upgrade found no release to upgrade.
    #[error("release not found")]
    NotFound,

    #[error("timed out waiting for the release to converge")]
    Timeout,

    #[error("{0:#}")]
    Failed(#[source] anyhow::Error),
}

/// Converges the target environment. The only mutating collaborator.
pub trait ReleaseExecutor {
    fn execute_install(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError>;

    fn execute_upgrade(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError>;
}

/// Resolves a bundle reference (path or `repo/name`) to a local bundle directory.
pub trait BundleLocator {
    fn locate(
        &self,
        reference: &str,
        version: Option<&str>,
        repos: &RepositoryOptions,
    ) -> anyhow::Result<Utf8PathBuf>;
}
