use crate::ports::{
    ExecuteError, ExecuteOptions, ProbeError, ReleaseExecutor, ReleaseProbe,
};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use convoy_types::{Bundle, Hook, HookEvent, Release, ReleaseStatus, Values};
use fs_err as fs;
use std::time::Instant;
use tracing::{debug, warn};

/// Namespace that exists without `--create-namespace`.
const DEFAULT_NAMESPACE: &str = "default";

/// Release history on disk: `<root>/<namespace>/<name>/<revision>.json`.
///
/// Acts as both the probe and the executor, so the binary works without a cluster.
/// Rendering concatenates template files verbatim; there is no template engine.
#[derive(Debug, Clone)]
pub struct FsReleaseStore {
    root: Utf8PathBuf,
}

impl FsReleaseStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn release_dir(&self, namespace: &str, name: &str) -> Utf8PathBuf {
        self.root.join(namespace).join(name)
    }

    fn record_path(&self, release: &Release) -> Utf8PathBuf {
        self.release_dir(&release.namespace, &release.name)
            .join(format!("{}.json", release.revision))
    }

    fn namespace_exists(&self, namespace: &str) -> bool {
        namespace == DEFAULT_NAMESPACE || self.root.join(namespace).is_dir()
    }

    /// Every stored revision, oldest first.
    pub fn history(&self, namespace: &str, name: &str) -> anyhow::Result<Vec<Release>> {
        let dir = self.release_dir(namespace, name);
        if !dir.is_dir() {
            return Ok(vec![]);
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_record = path.extension().is_some_and(|e| e == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.parse::<u32>().is_ok());
            if !is_record {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let release: Release = serde_json::from_str(&text)
                .with_context(|| format!("parse release record {}", path.display()))?;
            out.push(release);
        }
        out.sort_by_key(|r| r.revision);
        Ok(out)
    }

    fn write(&self, release: &Release) -> anyhow::Result<()> {
        let path = self.record_path(release);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(release).context("serialize release")?;
        fs::write(&path, json)?;
        debug!(
            path = %path,
            release = release.name.as_str(),
            revision = release.revision,
            status = %release.info.status,
            "wrote release record"
        );
        Ok(())
    }

    fn remove(&self, release: &Release) -> anyhow::Result<()> {
        let path = self.record_path(release);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn ensure_namespace(&self, opts: &ExecuteOptions) -> Result<(), ExecuteError> {
        if self.namespace_exists(&opts.namespace) {
            return Ok(());
        }
        if !opts.create_namespace {
            return Err(ExecuteError::Failed(anyhow::anyhow!(
                "namespace {:?} not found",
                opts.namespace
            )));
        }
        if !opts.dry_run {
            fs::create_dir_all(self.root.join(&opts.namespace))
                .map_err(|e| ExecuteError::Failed(e.into()))?;
        }
        Ok(())
    }

    /// Store `release` as pending, wait, then mark it deployed.
    ///
    /// On timeout an atomic deploy removes the new revision; otherwise it stays, marked failed.
    fn converge(
        &self,
        mut release: Release,
        started: Instant,
        opts: &ExecuteOptions,
        success_description: &str,
    ) -> Result<Release, ExecuteError> {
        release.info.status = ReleaseStatus::Pending;
        self.write(&release).map_err(ExecuteError::Failed)?;

        if opts.wait && started.elapsed() >= opts.timeout {
            if opts.atomic {
                warn!(
                    release = release.name.as_str(),
                    revision = release.revision,
                    "timed out with --atomic, rolling back"
                );
                self.remove(&release).map_err(ExecuteError::Failed)?;
            } else {
                release.info.status = ReleaseStatus::Failed;
                release.info.description =
                    format!("Release {:?} failed: timed out waiting for the condition", release.name);
                self.write(&release).map_err(ExecuteError::Failed)?;
            }
            return Err(ExecuteError::Timeout);
        }

        release.info.status = ReleaseStatus::Deployed;
        release.info.description = opts
            .description
            .clone()
            .unwrap_or_else(|| success_description.to_string());
        self.write(&release).map_err(ExecuteError::Failed)?;
        Ok(release)
    }
}

impl ReleaseProbe for FsReleaseStore {
    fn probe_release(&self, namespace: &str, name: &str) -> Result<Release, ProbeError> {
        let history = self
            .history(namespace, name)
            .map_err(ProbeError::Unavailable)?;
        history.into_iter().next_back().ok_or(ProbeError::NotFound)
    }
}

impl ReleaseExecutor for FsReleaseStore {
    fn execute_install(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError> {
        let started = Instant::now();
        self.ensure_namespace(opts)?;

        let history = self
            .history(&opts.namespace, &opts.name)
            .map_err(ExecuteError::Failed)?;
        if !history.is_empty() {
            return Err(ExecuteError::AlreadyExists);
        }

        let mut release = build_release(bundle, config, opts, 1);
        release.info.first_deployed = release.info.last_deployed;

        if opts.dry_run {
            release.info.description = "Dry run complete".to_string();
            return Ok(release);
        }
        self.converge(release, started, opts, "Install complete")
    }

    fn execute_upgrade(
        &self,
        bundle: &Bundle,
        config: &Values,
        opts: &ExecuteOptions,
    ) -> Result<Release, ExecuteError> {
        let started = Instant::now();
        let history = self
            .history(&opts.namespace, &opts.name)
            .map_err(ExecuteError::Failed)?;
        let Some(previous) = history.last() else {
            return Err(ExecuteError::NotFound);
        };

        let mut release = build_release(bundle, config, opts, previous.revision + 1);
        release.info.first_deployed = previous.info.first_deployed;

        if opts.dry_run {
            release.info.description = "Dry run complete".to_string();
            return Ok(release);
        }

        let release = self.converge(release, started, opts, "Upgrade complete")?;

        for mut older in history {
            if older.info.status == ReleaseStatus::Deployed {
                older.info.status = ReleaseStatus::Superseded;
                self.write(&older).map_err(ExecuteError::Failed)?;
            }
        }
        Ok(release)
    }
}

fn build_release(bundle: &Bundle, config: &Values, opts: &ExecuteOptions, revision: u32) -> Release {
    let mut release = Release::new(&opts.name, &opts.namespace, revision, bundle.metadata.clone());
    let (manifest, hooks, notes) = render_manifest(bundle);
    release.config = config.clone();
    release.manifest = manifest;
    release.hooks = hooks;
    release.info.notes = notes;
    release.info.last_deployed = Some(Utc::now());
    release
}

/// Split a bundle's templates into manifest text, test hooks and notes.
///
/// Sub-bundle templates are included after the parent's.
pub fn render_manifest(bundle: &Bundle) -> (String, Vec<Hook>, String) {
    let mut manifest = String::new();
    let mut hooks = Vec::new();
    let mut notes = String::new();
    collect(bundle, bundle.name(), &mut manifest, &mut hooks, &mut notes, true);
    (manifest, hooks, notes)
}

fn collect(
    bundle: &Bundle,
    prefix: &str,
    manifest: &mut String,
    hooks: &mut Vec<Hook>,
    notes: &mut String,
    top_level: bool,
) {
    for template in &bundle.templates {
        let path = format!("{prefix}/{}", template.name);
        if template.name.ends_with("NOTES.txt") {
            // Only the top-level bundle's notes are shown.
            if top_level {
                notes.push_str(&template.data);
            }
            continue;
        }
        if template.name.contains("/tests/") {
            let name = Utf8Path::new(&template.name)
                .file_stem()
                .unwrap_or(template.name.as_str())
                .to_string();
            hooks.push(Hook {
                name,
                path,
                events: vec![HookEvent::Test],
                manifest: template.data.clone(),
                last_run: Default::default(),
            });
            continue;
        }
        manifest.push_str("---\n# Source: ");
        manifest.push_str(&path);
        manifest.push('\n');
        manifest.push_str(&template.data);
        if !template.data.ends_with('\n') {
            manifest.push('\n');
        }
    }
    for sub in &bundle.dependencies {
        let sub_prefix = format!("{prefix}/charts/{}", sub.name());
        collect(sub, &sub_prefix, manifest, hooks, notes, false);
    }
}
