//! Install and Upgrade operations.
//!
//! Both hand convergence to the [`ReleaseExecutor`] and translate its outcome into the
//! deploy error taxonomy. Neither retries.

use crate::error::{DeployError, Operation};
use crate::ports::{ExecuteError, ExecuteOptions, ReleaseExecutor};
use convoy_types::{Bundle, Release, Values};
use convoy_values::merge_values;
use tracing::{info, warn};

/// Install a new release. Produces revision 1.
pub fn install(
    executor: &dyn ReleaseExecutor,
    bundle: &Bundle,
    config: &Values,
    opts: &ExecuteOptions,
) -> Result<Release, DeployError> {
    let release = executor
        .execute_install(bundle, config, opts)
        .map_err(|e| map_execute_error(Operation::Install, opts, e))?;
    info!(
        release = opts.name.as_str(),
        namespace = opts.namespace.as_str(),
        revision = release.revision,
        "install complete"
    );
    Ok(release)
}

/// Upgrade `current` to a new revision with the effective configuration.
pub fn upgrade(
    executor: &dyn ReleaseExecutor,
    current: &Release,
    bundle: &Bundle,
    config: Values,
    reuse_values: bool,
    reset_values: bool,
    opts: &ExecuteOptions,
) -> Result<Release, DeployError> {
    let effective = upgrade_values(&current.config, config, reuse_values, reset_values);
    let release = executor
        .execute_upgrade(bundle, &effective, opts)
        .map_err(|e| map_execute_error(Operation::Upgrade, opts, e))?;
    info!(
        release = opts.name.as_str(),
        namespace = opts.namespace.as_str(),
        revision = release.revision,
        previous = current.revision,
        "upgrade complete"
    );
    Ok(release)
}

/// Configuration an upgrade applies, given the previous revision's stored config.
///
/// - `reset_values`: only `new`, even if `reuse_values` is also set.
/// - `reuse_values`: `new` merged over `previous`.
/// - neither: `new`, or `previous` when no overrides were given at all.
pub fn upgrade_values(
    previous: &Values,
    new: Values,
    reuse_values: bool,
    reset_values: bool,
) -> Values {
    if reset_values {
        if reuse_values {
            warn!("both --reset-values and --reuse-values given; --reset-values wins");
        }
        return new;
    }
    if reuse_values {
        let mut merged = previous.clone();
        merge_values(&mut merged, new);
        return merged;
    }
    if new.is_empty() {
        return previous.clone();
    }
    new
}

fn map_execute_error(operation: Operation, opts: &ExecuteOptions, err: ExecuteError) -> DeployError {
    let release = opts.name.clone();
    match err {
        ExecuteError::AlreadyExists => {
            warn!(
                release = release.as_str(),
                "release appeared between probe and {operation}"
            );
            DeployError::Precondition {
                release,
                operation,
                message: "cannot re-use a name that is still in use".to_string(),
            }
        }
        ExecuteError::NotFound => {
            let message = format!("{release:?} has no deployed releases");
            DeployError::Precondition {
                release,
                operation,
                message,
            }
        }
        ExecuteError::Timeout => DeployError::Timeout {
            release,
            operation,
            timeout: opts.timeout,
        },
        ExecuteError::Failed(source) => DeployError::Execution {
            release,
            operation,
            source,
        },
    }
}
