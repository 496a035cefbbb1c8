use crate::ports::{
    BundleLoader, BundleLocator, DependencyFetcher, ExecuteError, ExecuteOptions, ProbeError,
    ReleaseExecutor, ReleaseProbe, RepositoryOptions, SourceReader,
};
use super::fs_store::render_manifest;
use anyhow::anyhow;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use convoy_types::{Bundle, Release, ReleaseStatus, Values};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A call the executor received.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Install {
        bundle: String,
        config: Values,
        opts: ExecuteOptions,
    },
    Upgrade {
        bundle: String,
        config: Values,
        opts: ExecuteOptions,
    },
}

impl ExecutorCall {
    pub fn config(&self) -> &Values {
        match self {
            ExecutorCall::Install { config, .. } | ExecutorCall::Upgrade { config, .. } => config,
        }
    }

    pub fn is_install(&self) -> bool {
        matches!(self, ExecutorCall::Install { .. })
    }
}

/// A failure the next executor call returns instead of converging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    AlreadyExists,
    NotFound,
    Timeout,
    Failed(String),
}

/// Release backend held in memory. Records every executor call.
#[derive(Debug, Default)]
pub struct InMemoryReleaseStore {
    releases: Mutex<BTreeMap<(String, String), Vec<Release>>>,
    calls: Mutex<Vec<ExecutorCall>>,
    unavailable: Option<String>,
    next_failure: Mutex<Option<InjectedFailure>>,
}

impl InMemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored revision.
    pub fn with_release(self, release: Release) -> Self {
        lock(&self.releases)
            .entry((release.namespace.clone(), release.name.clone()))
            .or_default()
            .push(release);
        self
    }

    /// Every probe fails with an unavailable backend.
    pub fn with_unavailable_backend(mut self, message: impl Into<String>) -> Self {
        self.unavailable = Some(message.into());
        self
    }

    pub fn fail_next_execution(&self, failure: InjectedFailure) {
        *lock(&self.next_failure) = Some(failure);
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        lock(&self.calls).clone()
    }

    pub fn history(&self, namespace: &str, name: &str) -> Vec<Release> {
        lock(&self.releases)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn take_failure(&self) -> Option<ExecuteError> {
        lock(&self.next_failure).take().map(|f| match f {
            InjectedFailure::AlreadyExists => ExecuteError::AlreadyExists,
            InjectedFailure::NotFound => ExecuteError::NotFound,
            InjectedFailure::Timeout => ExecuteError::Timeout,
            InjectedFailure::Failed(msg) => ExecuteError::Failed(anyhow!(msg)),
        })
    }

    fn record(&self, call: ExecutorCall) {
        lock(&self.calls).push(call);
    }
}

fn new_release(bundle: &Bundle, config: &Values, opts: &ExecuteOptions, revision: u32) -> Release {
    let mut release = Release::new(&opts.name, &opts.namespace, revision, bundle.metadata.clone());
    let (manifest, hooks, notes) = render_manifest(bundle);
    release.config = config.clone();
    release.manifest = manifest;
    release.hooks = hooks;
    release.info.notes = notes;
    release.info.last_deployed = Some(Utc::now());
    release
}

impl ReleaseProbe for InMemoryReleaseStore {
    fn probe_release(&self, namespace: &str, name: &str) -> Result<Release, ProbeError> {
        if let Some(message) = &self.unavailable {
            return Err(ProbeError::Unavailable(anyhow!(message.clone())));
        }
        self.history(namespace, name)
            .pop()
            .ok_or(ProbeError::NotFound)
    }
}

impl ReleaseExecutor for InMemoryReleaseStore {
    fn execute_install(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError> {
        self.record(ExecutorCall::Install {
            bundle: bundle.name().to_string(),
            config: config.clone(),
            opts: opts.clone(),
        });
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let key = (opts.namespace.clone(), opts.name.clone());
        let mut releases = lock(&self.releases);
        if releases.get(&key).is_some_and(|h| !h.is_empty()) {
            return Err(ExecuteError::AlreadyExists);
        }

        let mut release = new_release(bundle, config, opts, 1);
        release.info.first_deployed = release.info.last_deployed;
        if opts.dry_run {
            release.info.description = "Dry run complete".to_string();
            return Ok(release);
        }
        release.info.status = ReleaseStatus::Deployed;
        release.info.description = "Install complete".to_string();
        releases.entry(key).or_default().push(release.clone());
        Ok(release)
    }

    fn execute_upgrade(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError> {
        self.record(ExecutorCall::Upgrade {
            bundle: bundle.name().to_string(),
            config: config.clone(),
            opts: opts.clone(),
        });
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let key = (opts.namespace.clone(), opts.name.clone());
        let mut releases = lock(&self.releases);
        let Some(history) = releases.get_mut(&key).filter(|h| !h.is_empty()) else {
            return Err(ExecuteError::NotFound);
        };
        let Some(previous) = history.last() else {
            return Err(ExecuteError::NotFound);
        };

        let mut release = new_release(bundle, config, opts, previous.revision + 1);
        release.info.first_deployed = previous.info.first_deployed;
        if opts.dry_run {
            release.info.description = "Dry run complete".to_string();
            return Ok(release);
        }
        for older in history.iter_mut() {
            if older.info.status == ReleaseStatus::Deployed {
                older.info.status = ReleaseStatus::Superseded;
            }
        }
        release.info.status = ReleaseStatus::Deployed;
        release.info.description = "Upgrade complete".to_string();
        history.push(release.clone());
        Ok(release)
    }
}

/// Bundles held in memory, keyed by reference. Locating returns the reference as the path.
///
/// Records loads and fetches. A bundle registered with [`Self::after_fetch`] replaces
/// the stored one once a fetch has run.
#[derive(Debug, Default)]
pub struct InMemoryBundles {
    bundles: Mutex<BTreeMap<String, Bundle>>,
    fetched: Mutex<BTreeMap<String, Bundle>>,
    loads: Mutex<Vec<Utf8PathBuf>>,
    fetches: Mutex<Vec<Utf8PathBuf>>,
    fetch_error: Option<String>,
}

impl InMemoryBundles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(self, reference: impl Into<String>, bundle: Bundle) -> Self {
        lock(&self.bundles).insert(reference.into(), bundle);
        self
    }

    pub fn after_fetch(self, reference: impl Into<String>, bundle: Bundle) -> Self {
        lock(&self.fetched).insert(reference.into(), bundle);
        self
    }

    pub fn with_fetch_error(mut self, message: impl Into<String>) -> Self {
        self.fetch_error = Some(message.into());
        self
    }

    pub fn loads(&self) -> Vec<Utf8PathBuf> {
        lock(&self.loads).clone()
    }

    pub fn fetches(&self) -> Vec<Utf8PathBuf> {
        lock(&self.fetches).clone()
    }
}

impl BundleLocator for InMemoryBundles {
    fn locate(
        &self,
        reference: &str,
        _version: Option<&str>,
        _repos: &RepositoryOptions,
    ) -> anyhow::Result<Utf8PathBuf> {
        if lock(&self.bundles).contains_key(reference) {
            Ok(Utf8PathBuf::from(reference))
        } else {
            Err(anyhow!("bundle {reference:?} not found"))
        }
    }
}

impl BundleLoader for InMemoryBundles {
    fn load(&self, path: &Utf8Path) -> anyhow::Result<Bundle> {
        lock(&self.loads).push(path.to_path_buf());
        lock(&self.bundles)
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("no bundle at {path}"))
    }
}

impl DependencyFetcher for InMemoryBundles {
    fn fetch_and_lock(&self, bundle_path: &Utf8Path, _repos: &RepositoryOptions) -> anyhow::Result<()> {
        lock(&self.fetches).push(bundle_path.to_path_buf());
        if let Some(message) = &self.fetch_error {
            return Err(anyhow!(message.clone()));
        }
        if let Some(updated) = lock(&self.fetched).remove(bundle_path.as_str()) {
            lock(&self.bundles).insert(bundle_path.to_string(), updated);
        }
        Ok(())
    }
}

/// Value sources held in memory. Records every read.
#[derive(Debug, Default)]
pub struct InMemorySources {
    sources: BTreeMap<String, Vec<u8>>,
    reads: Mutex<Vec<String>>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.sources.insert(name.into(), body.into());
        self
    }

    pub fn reads(&self) -> Vec<String> {
        lock(&self.reads).clone()
    }
}

impl SourceReader for InMemorySources {
    fn read(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        lock(&self.reads).push(source.to_string());
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow!("{source}: no such file"))
    }
}
