use camino::{Utf8Path, Utf8PathBuf};
use convoy_bundle::{
    BundleLoader, DependencyError, DependencyFetcher, FetchStage, FsBundleLoader,
    FsDependencyFetcher, RepositoryOptions, ensure_dependencies,
};
use convoy_types::Bundle;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use tempfile::TempDir;

fn write(root: &Utf8Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

struct Fixture {
    _tmp: TempDir,
    app: Utf8PathBuf,
    repos: RepositoryOptions,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    let app = root.join("app");
    let repo = root.join("repo");

    write(
        &app,
        "Bundle.yaml",
        "name: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: \"^1\"\n    repository: \"@stable\"\n",
    );
    write(&app, "templates/deploy.yaml", "kind: Deployment\n");
    write(&repo, "redis-1.1.0/Bundle.yaml", "name: redis\nversion: 1.1.0\n");
    write(&repo, "redis-1.1.0/templates/sts.yaml", "kind: StatefulSet\n");

    Fixture {
        _tmp: tmp,
        app,
        repos: RepositoryOptions::default().with_repository("stable", repo),
    }
}

#[derive(Default)]
struct CountingFetcher {
    calls: Cell<usize>,
}

impl DependencyFetcher for CountingFetcher {
    fn fetch_and_lock(&self, _: &Utf8Path, _: &RepositoryOptions) -> anyhow::Result<()> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

struct FailingLoader;

impl BundleLoader for FailingLoader {
    fn load(&self, _: &Utf8Path) -> anyhow::Result<Bundle> {
        anyhow::bail!("corrupt bundle")
    }
}

#[test]
fn missing_dependency_without_update_fails_and_does_not_fetch() {
    let fx = fixture();
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();
    let fetcher = CountingFetcher::default();

    let err = ensure_dependencies(bundle, &fx.app, false, &fx.repos, &FsBundleLoader, &fetcher)
        .unwrap_err();

    assert!(matches!(err, DependencyError::Unsatisfied { .. }));
    assert_eq!(err.unmet_names(), vec!["redis"]);
    assert_eq!(fetcher.calls.get(), 0);
    assert!(!fx.app.join("charts").exists());
}

#[test]
fn update_fetches_locks_and_reloads() {
    let fx = fixture();
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();

    let reloaded = ensure_dependencies(
        bundle,
        &fx.app,
        true,
        &fx.repos,
        &FsBundleLoader,
        &FsDependencyFetcher,
    )
    .unwrap();

    let redis = reloaded.sub_bundle("redis").expect("redis fetched");
    assert_eq!(redis.version(), "1.1.0");
    assert_eq!(redis.templates.len(), 1);

    let lock = reloaded.lock.expect("lock written");
    assert_eq!(lock.schema, convoy_types::schema::CONVOY_LOCK_V1);
    assert_eq!(lock.dependencies.len(), 1);
    assert_eq!(lock.dependencies[0].version, "1.1.0");
    assert_eq!(lock.dependencies[0].repository.as_deref(), Some("@stable"));
    assert_eq!(
        lock.digest,
        convoy_bundle::dependency_digest(&reloaded.metadata.dependencies)
    );
}

#[test]
fn satisfied_bundle_is_returned_without_fetch() {
    let fx = fixture();
    write(&fx.app, "charts/redis/Bundle.yaml", "name: redis\nversion: 1.0.5\n");
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();
    let fetcher = CountingFetcher::default();

    let out = ensure_dependencies(bundle.clone(), &fx.app, true, &fx.repos, &FsBundleLoader, &fetcher)
        .unwrap();
    assert_eq!(out, bundle);
    assert_eq!(fetcher.calls.get(), 0);
}

#[test]
fn reload_failure_is_distinct_from_unmet() {
    let fx = fixture();
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();
    let fetcher = CountingFetcher::default();

    let err = ensure_dependencies(bundle, &fx.app, true, &fx.repos, &FailingLoader, &fetcher)
        .unwrap_err();

    match err {
        DependencyError::Fetch { stage, .. } => assert_eq!(stage, FetchStage::Reload),
        other => panic!("expected reload failure, got {other:?}"),
    }
    assert_eq!(fetcher.calls.get(), 1);
}

#[test]
fn fetch_failure_reports_fetch_stage() {
    let fx = fixture();
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();

    let err = ensure_dependencies(
        bundle,
        &fx.app,
        true,
        &RepositoryOptions::default(),
        &FsBundleLoader,
        &FsDependencyFetcher,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        DependencyError::Fetch {
            stage: FetchStage::Fetch,
            ..
        }
    ));
    assert!(format!("{err}").contains("stable"));
}

#[test]
fn vendored_dependency_survives_an_update() {
    let fx = fixture();
    write(
        &fx.app,
        "Bundle.yaml",
        "name: app\nversion: 1.0.0\ndependencies:\n  - name: common\n    version: \"^2\"\n  - name: redis\n    version: \"^1\"\n    repository: \"@stable\"\n",
    );
    write(&fx.app, "charts/common/Bundle.yaml", "name: common\nversion: 2.0.0\n");
    write(&fx.app, "charts/common/templates/_helpers.tpl", "{{/* shared */}}\n");
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();

    let reloaded = ensure_dependencies(
        bundle,
        &fx.app,
        true,
        &fx.repos,
        &FsBundleLoader,
        &FsDependencyFetcher,
    )
    .unwrap();

    assert!(fx.app.join("charts/common/Bundle.yaml").is_file());
    assert!(fx.app.join("charts/common/templates/_helpers.tpl").is_file());
    assert!(fx.app.join("charts/redis/Bundle.yaml").is_file());
    assert!(!fx.app.join("charts/.common.partial").exists());
    assert_eq!(reloaded.sub_bundle("common").expect("common kept").version(), "2.0.0");

    let lock = reloaded.lock.expect("lock written");
    let names: Vec<&str> = lock.dependencies.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["common", "redis"]);
    assert_eq!(lock.dependencies[0].version, "2.0.0");
    assert_eq!(lock.dependencies[0].repository, None);
}

#[test]
fn update_that_leaves_dependencies_unmet_fails_verification() {
    let fx = fixture();
    let bundle = FsBundleLoader.load_dir(&fx.app).unwrap();
    let fetcher = CountingFetcher::default();

    let err = ensure_dependencies(bundle, &fx.app, true, &fx.repos, &FsBundleLoader, &fetcher)
        .unwrap_err();

    match &err {
        DependencyError::Fetch { stage, .. } => assert_eq!(*stage, FetchStage::Verify),
        other => panic!("expected verification failure, got {other:?}"),
    }
    assert!(err.to_string().contains("redis"));
    assert_eq!(fetcher.calls.get(), 1);
}
