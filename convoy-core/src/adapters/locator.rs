use crate::ports::{BundleLocator, RepositoryOptions};
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use convoy_bundle::{constraint_matches, find_in_repository, read_metadata};
use tracing::debug;

/// Resolves bundle references against the local filesystem.
///
/// Accepted forms, in lookup order:
/// - a bundle directory path (optionally `file://`)
/// - `alias/name`, searched in the aliased repository
/// - a bare `name`, searched in the repository cache
///
/// Repository hits resolve in place: the returned path is the `<name>-<version>`
/// directory inside the repository, not a copy. A deploy with `--dependency-update`
/// writes that bundle's `charts/` and `Bundle.lock` there, so every later user of the
/// repository sees them.
#[derive(Debug, Clone, Default)]
pub struct FsBundleLocator {
    base_dir: Option<Utf8PathBuf>,
}

impl FsBundleLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `base_dir` instead of the working directory.
    pub fn with_base_dir(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn local_path(&self, reference: &str) -> Utf8PathBuf {
        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        let path = Utf8Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl BundleLocator for FsBundleLocator {
    fn locate(
        &self,
        reference: &str,
        version: Option<&str>,
        repos: &RepositoryOptions,
    ) -> anyhow::Result<Utf8PathBuf> {
        let constraint = version.unwrap_or_default();

        let local = self.local_path(reference);
        if local.is_dir() {
            if !constraint.is_empty() {
                let meta = read_metadata(&local)?;
                let ok = constraint_matches(constraint, &meta.version).map_err(anyhow::Error::msg)?;
                if !ok {
                    bail!(
                        "bundle at {local} has version {} which does not satisfy {constraint:?}",
                        meta.version
                    );
                }
            }
            debug!(reference, path = %local, "bundle reference is a local directory");
            return Ok(local);
        }

        let looks_like_path = reference.starts_with('.')
            || reference.starts_with('/')
            || reference.starts_with("file://");
        if !looks_like_path && let Some((alias, name)) = reference.split_once('/') {
            let repo = repos.repository(alias)?;
            let (found, dir) = find_in_repository(repo, name, constraint)
                .with_context(|| format!("locate {reference}"))?;
            debug!(reference, version = %found, path = %dir, "bundle found in repository");
            return Ok(dir);
        }

        if !looks_like_path && let Some(cache) = &repos.cache_dir {
            let (found, dir) = find_in_repository(cache, reference, constraint)
                .with_context(|| format!("locate {reference}"))?;
            debug!(reference, version = %found, path = %dir, "bundle found in repository cache");
            return Ok(dir);
        }

        bail!("bundle {reference:?} not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Utf8Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn setup() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        write(&root, "app/Bundle.yaml", "name: app\nversion: 1.0.0\n");
        write(&root, "repo/web-1.0.0/Bundle.yaml", "name: web\nversion: 1.0.0\n");
        write(&root, "repo/web-1.2.0/Bundle.yaml", "name: web\nversion: 1.2.0\n");
        (tmp, root)
    }

    #[test]
    fn local_directory_is_returned_as_is() {
        let (_tmp, root) = setup();
        let locator = FsBundleLocator::with_base_dir(root.clone());
        let path = locator
            .locate("app", None, &RepositoryOptions::default())
            .unwrap();
        assert_eq!(path, root.join("app"));
    }

    #[test]
    fn local_directory_must_satisfy_version() {
        let (_tmp, root) = setup();
        let locator = FsBundleLocator::with_base_dir(root);
        let err = locator
            .locate("app", Some("^2"), &RepositoryOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not satisfy"));
    }

    #[test]
    fn alias_reference_picks_highest_match() {
        let (_tmp, root) = setup();
        let repos = RepositoryOptions::default().with_repository("stable", root.join("repo"));
        let locator = FsBundleLocator::new();

        assert_eq!(
            locator.locate("stable/web", None, &repos).unwrap(),
            root.join("repo/web-1.2.0")
        );
        assert_eq!(
            locator.locate("stable/web", Some("~1.0"), &repos).unwrap(),
            root.join("repo/web-1.0.0")
        );
    }

    #[test]
    fn repository_hit_is_not_copied() {
        let (_tmp, root) = setup();
        let repos = RepositoryOptions::default().with_repository("stable", root.join("repo"));

        let path = FsBundleLocator::new().locate("stable/web", None, &repos).unwrap();

        assert!(path.starts_with(root.join("repo")));
        let entries = std::fs::read_dir(root.join("repo")).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let locator = FsBundleLocator::new();
        let err = locator
            .locate("nowhere/web", None, &RepositoryOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("nowhere"));
        assert!(locator
            .locate("./missing", None, &RepositoryOptions::default())
            .is_err());
    }
}
