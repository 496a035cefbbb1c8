//! Port traits for the bundle storage collaborators.

use crate::repo::RepositoryOptions;
use camino::Utf8Path;
use convoy_types::Bundle;

/// Parses a bundle directory into the in-memory model.
pub trait BundleLoader {
    fn load(&self, path: &Utf8Path) -> anyhow::Result<Bundle>;
}

/// Downloads declared dependencies into the bundle's `charts/` and writes the lock file.
pub trait DependencyFetcher {
    fn fetch_and_lock(&self, bundle_path: &Utf8Path, repos: &RepositoryOptions)
    -> anyhow::Result<()>;
}
