use crate::check::unmet_dependencies;
use crate::error::{DependencyError, FetchStage, format_unmet};
use crate::ports::{BundleLoader, DependencyFetcher};
use crate::repo::RepositoryOptions;
use camino::Utf8Path;
use convoy_types::Bundle;
use tracing::{debug, info};

/// Make sure every declared dependency of `bundle` is present under `charts/`.
///
/// With `update_allowed`, unmet dependencies trigger exactly one fetch followed by one
/// reload from `bundle_path`. The reloaded bundle is returned; if it still has unmet
/// dependencies the update failed at [`FetchStage::Verify`]. Without `update_allowed`,
/// unmet dependencies are an error and nothing is fetched.
pub fn ensure_dependencies(
    bundle: Bundle,
    bundle_path: &Utf8Path,
    update_allowed: bool,
    repos: &RepositoryOptions,
    loader: &dyn BundleLoader,
    fetcher: &dyn DependencyFetcher,
) -> Result<Bundle, DependencyError> {
    if bundle.metadata.dependencies.is_empty() {
        return Ok(bundle);
    }

    let unmet = unmet_dependencies(&bundle);
    if unmet.is_empty() {
        debug!(bundle = bundle.name(), "all dependencies present");
        return Ok(bundle);
    }
    if !update_allowed {
        return Err(DependencyError::Unsatisfied { unmet });
    }

    info!(
        bundle = bundle.name(),
        unmet = unmet.len(),
        "updating dependencies"
    );
    fetcher
        .fetch_and_lock(bundle_path, repos)
        .map_err(|source| DependencyError::Fetch {
            stage: FetchStage::Fetch,
            source,
        })?;

    let reloaded = loader
        .load(bundle_path)
        .map_err(|source| DependencyError::Fetch {
            stage: FetchStage::Reload,
            source,
        })?;

    let still_unmet = unmet_dependencies(&reloaded);
    if !still_unmet.is_empty() {
        return Err(DependencyError::Fetch {
            stage: FetchStage::Verify,
            source: anyhow::anyhow!("still unmet after update: {}", format_unmet(&still_unmet)),
        });
    }
    Ok(reloaded)
}
