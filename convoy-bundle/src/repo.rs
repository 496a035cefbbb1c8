use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

/// Where bundle and dependency references resolve to on disk.
///
/// A repository is a directory holding one sub-directory per bundle version,
/// named `<name>-<version>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Alias → repository directory.
    pub repositories: BTreeMap<String, Utf8PathBuf>,

    /// Searched for dependencies that name no repository.
    pub cache_dir: Option<Utf8PathBuf>,
}

/// Where a single dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DependencySource {
    /// A repository directory of `<name>-<version>` bundles.
    Repository(Utf8PathBuf),
    /// A bundle directory used as-is (`file://`).
    Directory(Utf8PathBuf),
}

impl RepositoryOptions {
    pub fn with_repository(mut self, alias: impl Into<String>, dir: impl Into<Utf8PathBuf>) -> Self {
        self.repositories.insert(alias.into(), dir.into());
        self
    }

    pub fn repository(&self, alias: &str) -> anyhow::Result<&Utf8Path> {
        self.repositories
            .get(alias)
            .map(Utf8PathBuf::as_path)
            .with_context(|| format!("no repository named {alias:?} is configured"))
    }

    /// Resolve a dependency's `repository` field. `file://` paths are relative to the bundle.
    pub(crate) fn dependency_source(
        &self,
        repository: Option<&str>,
        bundle_path: &Utf8Path,
    ) -> anyhow::Result<DependencySource> {
        let repository = repository.map(str::trim).unwrap_or_default();

        if repository.is_empty() {
            return match &self.cache_dir {
                Some(dir) => Ok(DependencySource::Repository(dir.clone())),
                None => bail!("dependency names no repository and no repository cache is configured"),
            };
        }
        if let Some(path) = repository.strip_prefix("file://") {
            let path = Utf8Path::new(path);
            let dir = if path.is_relative() {
                bundle_path.join(path)
            } else {
                path.to_path_buf()
            };
            return Ok(DependencySource::Directory(dir));
        }

        let alias = repository
            .strip_prefix('@')
            .or_else(|| repository.strip_prefix("alias:"))
            .unwrap_or(repository);
        Ok(DependencySource::Repository(self.repository(alias)?.to_path_buf()))
    }
}
