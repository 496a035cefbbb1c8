//! The deploy orchestrator: probe, then install or upgrade.
//!
//! I/O-agnostic. Every collaborator is reached through [`DeployPorts`].

use crate::error::{DeployError, Operation, Phase};
use crate::name::validate_release_name;
use crate::operations::{install, upgrade};
use crate::ports::{
    BundleLoader, BundleLocator, DependencyFetcher, ExecuteOptions, ReleaseExecutor, ReleaseProbe,
    SourceReader,
};
use crate::probe::{ProbeOutcome, probe};
use crate::settings::{DeployRequest, DeploySettings};
use convoy_bundle::ensure_dependencies;
use convoy_types::{Bundle, BundleType, Release, Values};
use tracing::{debug, info, warn};

/// Orchestrator states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Start,
    Probing,
    Installing,
    Upgrading,
    Done,
    Failed,
}

/// Collaborators a deploy runs against.
#[derive(Clone, Copy)]
pub struct DeployPorts<'a> {
    pub probe: &'a dyn ReleaseProbe,
    pub locator: &'a dyn BundleLocator,
    pub loader: &'a dyn BundleLoader,
    pub fetcher: &'a dyn DependencyFetcher,
    pub values: &'a dyn SourceReader,
    pub executor: &'a dyn ReleaseExecutor,
}

/// Outcome of `deploy`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub operation: Operation,
    pub release: Release,
}

/// Converge one release: install it if verifiably absent, upgrade it otherwise.
///
/// The first error from any step is returned unchanged. Nothing is rolled back here;
/// atomic handling belongs to the executor.
pub fn deploy(
    settings: &DeploySettings,
    request: &DeployRequest,
    ports: &DeployPorts<'_>,
) -> Result<DeployOutcome, DeployError> {
    transition("", DeployState::Start);
    let (name, reference) = parse_args(&request.args)?;

    let result = run(settings, request, ports, name, reference);
    match &result {
        Ok(outcome) => {
            transition(name, DeployState::Done);
            debug!(
                release = name,
                revision = outcome.release.revision,
                status = %outcome.release.info.status,
                "deploy finished"
            );
        }
        Err(e) => {
            transition(name, DeployState::Failed);
            debug!(release = name, phase = %e.phase(), error = %e, "deploy failed");
        }
    }
    result
}

fn run(
    settings: &DeploySettings,
    request: &DeployRequest,
    ports: &DeployPorts<'_>,
    name: &str,
    reference: &str,
) -> Result<DeployOutcome, DeployError> {
    let namespace = settings.namespace.as_str();

    transition(name, DeployState::Probing);
    let current = probe(ports.probe, namespace, name).map_err(|source| {
        DeployError::StateProbe {
            release: name.to_string(),
            source,
        }
    })?;

    let opts = ExecuteOptions {
        name: name.to_string(),
        namespace: namespace.to_string(),
        timeout: settings.timeout,
        wait: settings.effective_wait(),
        atomic: settings.atomic,
        create_namespace: settings.create_namespace,
        dry_run: request.dry_run,
        description: request.description.clone(),
    };

    match current {
        ProbeOutcome::Absent => {
            info!(release = name, namespace, "release does not exist, installing");
            transition(name, DeployState::Installing);
            let (bundle, config) = prepare(settings, request, ports, name, reference)?;
            let release = install(ports.executor, &bundle, &config, &opts)?;
            Ok(DeployOutcome {
                operation: Operation::Install,
                release,
            })
        }
        ProbeOutcome::Present(current) => {
            info!(
                release = name,
                namespace,
                revision = current.revision,
                "release exists, upgrading"
            );
            transition(name, DeployState::Upgrading);
            let (bundle, config) = prepare(settings, request, ports, name, reference)?;
            let release = upgrade(
                ports.executor,
                &current,
                &bundle,
                config,
                request.reuse_values,
                request.reset_values,
                &opts,
            )?;
            Ok(DeployOutcome {
                operation: Operation::Upgrade,
                release,
            })
        }
    }
}

/// Locate and load the bundle, reject non-installable types, resolve dependencies, and
/// only then resolve values.
fn prepare(
    settings: &DeploySettings,
    request: &DeployRequest,
    ports: &DeployPorts<'_>,
    name: &str,
    reference: &str,
) -> Result<(Bundle, Values), DeployError> {
    let load_err = |source: anyhow::Error| DeployError::BundleLoad {
        release: name.to_string(),
        reference: reference.to_string(),
        source,
    };

    let path = ports
        .locator
        .locate(reference, request.version.as_deref(), &settings.repositories)
        .map_err(load_err)?;
    let bundle = ports.loader.load(&path).map_err(load_err)?;
    debug!(
        release = name,
        bundle = bundle.name(),
        version = bundle.version(),
        path = %path,
        "bundle loaded"
    );

    if !bundle.is_installable() {
        let bundle_type = bundle
            .metadata
            .bundle_type
            .as_ref()
            .map(BundleType::to_string)
            .unwrap_or_default();
        return Err(DeployError::NotInstallable {
            release: name.to_string(),
            bundle_type,
        });
    }
    if bundle.metadata.deprecated {
        warn!(bundle = bundle.name(), version = bundle.version(), "bundle is deprecated");
    }

    let bundle = ensure_dependencies(
        bundle,
        &path,
        settings.dependency_update,
        &settings.repositories,
        ports.loader,
        ports.fetcher,
    )
    .map_err(|e| DeployError::from_dependency(name, e))?;

    let config = convoy_values::resolve(&request.values, ports.values)
        .map_err(|e| DeployError::from_values(name, e))?;
    debug!(release = name, keys = config.len(), "values resolved");

    Ok((bundle, config))
}

/// Split `[RELEASE, BUNDLE]` and validate the release name.
fn parse_args(args: &[String]) -> Result<(&str, &str), DeployError> {
    let parse_err = |release: &str, message: String| DeployError::Parse {
        release: release.to_string(),
        phase: Phase::Parse,
        message,
    };

    match args {
        [name, reference] => {
            validate_release_name(name).map_err(|m| parse_err(name.as_str(), m))?;
            if reference.trim().is_empty() {
                return Err(parse_err(
                    name.as_str(),
                    "bundle reference must not be empty".to_string(),
                ));
            }
            Ok((name.as_str(), reference.as_str()))
        }
        [] | [_] => Err(parse_err(
            args.first().map(String::as_str).unwrap_or_default(),
            format!(
                "expected a release name and a bundle reference, got {} argument(s)",
                args.len()
            ),
        )),
        [name, _, rest @ ..] => Err(parse_err(
            name.as_str(),
            format!("unexpected arguments: {}", rest.join(" ")),
        )),
    }
}

fn transition(release: &str, state: DeployState) {
    debug!(release, state = ?state, "deploy state");
}
