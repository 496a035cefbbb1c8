use crate::check::{constraint_matches, parse_version};
use crate::loader::{CHARTS_DIR, LOCK_FILE, read_metadata};
use crate::ports::DependencyFetcher;
use crate::repo::{DependencySource, RepositoryOptions};
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use convoy_types::{BundleLock, Dependency, LockedDependency};
use fs_err as fs;
use semver::Version;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Copies dependencies from local repositories into `charts/` and writes `Bundle.lock`.
#[derive(Debug, Clone, Default)]
pub struct FsDependencyFetcher;

impl DependencyFetcher for FsDependencyFetcher {
    fn fetch_and_lock(
        &self,
        bundle_path: &Utf8Path,
        repos: &RepositoryOptions,
    ) -> anyhow::Result<()> {
        let metadata = read_metadata(bundle_path)?;
        let mut lock = BundleLock::new(dependency_digest(&metadata.dependencies), Utc::now());

        for dep in &metadata.dependencies {
            let target = bundle_path.join(CHARTS_DIR).join(&dep.name);
            let (version, source_dir) = select(dep, bundle_path, repos)
                .with_context(|| format!("resolve dependency {}", dep.name))?;

            if same_dir(&source_dir, &target)? {
                debug!(
                    bundle = metadata.name.as_str(),
                    dependency = dep.name.as_str(),
                    "dependency is vendored in place"
                );
            } else {
                replace_dir(&source_dir, &target)
                    .with_context(|| format!("copy {source_dir} to {target}"))?;
            }

            info!(
                bundle = metadata.name.as_str(),
                dependency = dep.name.as_str(),
                version = %version,
                "fetched dependency"
            );
            lock.dependencies.push(LockedDependency {
                name: dep.name.clone(),
                version: version.to_string(),
                repository: dep.repository.clone(),
            });
        }

        let lock_path = bundle_path.join(LOCK_FILE);
        let yaml = serde_yaml::to_string(&lock).context("serialize Bundle.lock")?;
        fs::write(&lock_path, yaml)?;
        debug!(path = %lock_path, entries = lock.dependencies.len(), "wrote lock file");
        Ok(())
    }
}

/// sha256 over the declared dependency list, hex encoded.
pub fn dependency_digest(dependencies: &[Dependency]) -> String {
    let canonical = serde_json::to_string(dependencies).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Pick the directory to copy for `dep`, and the version it holds.
fn select(
    dep: &Dependency,
    bundle_path: &Utf8Path,
    repos: &RepositoryOptions,
) -> anyhow::Result<(Version, Utf8PathBuf)> {
    let source = match repos.dependency_source(dep.repository.as_deref(), bundle_path) {
        Ok(source) => source,
        // Vendored sub-bundles with no repository are locked at whatever is present.
        Err(e) if dep.repository.is_none() => {
            let present = bundle_path.join(CHARTS_DIR).join(&dep.name);
            if !present.is_dir() {
                return Err(e);
            }
            DependencySource::Directory(present)
        }
        Err(e) => return Err(e),
    };

    match source {
        DependencySource::Directory(dir) => {
            let meta = read_metadata(&dir)?;
            let version = parse_version(&meta.version)
                .with_context(|| format!("{dir}: version {:?} is not semver", meta.version))?;
            if !constraint_matches(&dep.version, &meta.version).map_err(anyhow::Error::msg)? {
                bail!(
                    "{dir} holds version {} which does not satisfy {:?}",
                    meta.version,
                    dep.version
                );
            }
            Ok((version, dir))
        }
        DependencySource::Repository(repo) => find_in_repository(&repo, &dep.name, &dep.version),
    }
}

/// Highest `<name>-<version>` directory in `repo` that satisfies `constraint`.
pub fn find_in_repository(
    repo: &Utf8Path,
    name: &str,
    constraint: &str,
) -> anyhow::Result<(Version, Utf8PathBuf)> {
    let prefix = format!("{name}-");
    let mut best: Option<(Version, Utf8PathBuf)> = None;

    for entry in fs::read_dir(repo)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(version) = name.strip_prefix(&prefix).and_then(parse_version) else {
            continue;
        };
        if !constraint_matches(constraint, &version.to_string()).map_err(anyhow::Error::msg)? {
            continue;
        }
        if best.as_ref().is_none_or(|(v, _)| version > *v) {
            best = Some((version, repo.join(name)));
        }
    }

    best.with_context(|| format!("no version of {name} in {repo} satisfies {constraint:?}"))
}

fn same_dir(a: &Utf8Path, b: &Utf8Path) -> anyhow::Result<bool> {
    if !b.exists() {
        return Ok(false);
    }
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

/// Copy `src` to a staging sibling of `dst`, then swap it in. A failed copy leaves `dst` as it was.
fn replace_dir(src: &Utf8Path, dst: &Utf8Path) -> anyhow::Result<()> {
    let name = dst.file_name().context("dependency target has no file name")?;
    let staging = dst.with_file_name(format!(".{name}.partial"));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    if let Err(e) = copy_dir(src, &staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    if dst.exists() {
        fs::remove_dir_all(dst)?;
    }
    fs::rename(&staging, dst)?;
    Ok(())
}

fn copy_dir(src: &Utf8Path, dst: &Utf8Path) -> anyhow::Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.as_std_path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Utf8Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn dep(name: &str, version: &str) -> Dependency {
        Dependency {
            name: name.to_string(),
            version: version.to_string(),
            repository: Some("@stable".to_string()),
            alias: None,
        }
    }

    #[test]
    fn digest_is_stable_and_order_sensitive() {
        let a = vec![dep("a", "^1"), dep("b", "^2")];
        let b = vec![dep("b", "^2"), dep("a", "^1")];
        assert_eq!(dependency_digest(&a), dependency_digest(&a));
        assert_ne!(dependency_digest(&a), dependency_digest(&b));
        assert!(dependency_digest(&a).starts_with("sha256:"));
    }

    #[test]
    fn replacing_a_dependency_swaps_in_the_new_copy() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        write(&root, "repo/redis-1.1.0/Bundle.yaml", "name: redis\nversion: 1.1.0\n");
        write(&root, "app/charts/redis/stale.txt", "old");

        let target = root.join("app/charts/redis");
        replace_dir(&root.join("repo/redis-1.1.0"), &target).unwrap();

        assert!(target.join("Bundle.yaml").is_file());
        assert!(!target.join("stale.txt").exists());
        assert!(!root.join("app/charts/.redis.partial").exists());
    }

    #[test]
    fn failed_copy_keeps_the_previous_dependency() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        write(&root, "app/charts/redis/Bundle.yaml", "name: redis\nversion: 1.0.0\n");

        let target = root.join("app/charts/redis");
        assert!(replace_dir(&root.join("repo/missing"), &target).is_err());

        assert!(target.join("Bundle.yaml").is_file());
        assert!(!root.join("app/charts/.redis.partial").exists());
    }

    #[test]
    fn highest_matching_version_wins() {
        let tmp = TempDir::new().unwrap();
        let repo = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        for v in ["1.0.0", "1.4.2", "2.0.0"] {
            write(&repo, &format!("redis-{v}/Bundle.yaml"), &format!("name: redis\nversion: {v}\n"));
        }
        write(&repo, "redis-extra-9.0.0/Bundle.yaml", "name: redis-extra\nversion: 9.0.0\n");

        let (version, dir) = find_in_repository(&repo, "redis", "^1").unwrap();
        assert_eq!(version, Version::new(1, 4, 2));
        assert_eq!(dir, repo.join("redis-1.4.2"));

        let err = find_in_repository(&repo, "redis", ">=3.0.0").unwrap_err();
        assert!(err.to_string().contains("no version of redis"));
    }
}
