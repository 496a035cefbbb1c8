//! Bundle handling for convoy.
//!
//! - [`BundleLoader`] / [`FsBundleLoader`] read a bundle directory into a [`Bundle`](convoy_types::Bundle).
//! - [`unmet_dependencies`] checks declared dependencies against the sub-bundles under `charts/`.
//! - [`ensure_dependencies`] fails, or fetches and reloads, when some are unmet.
//! - [`DependencyFetcher`] / [`FsDependencyFetcher`] copy sub-bundles in from local
//!   repositories and write `Bundle.lock`.

mod check;
mod ensure;
mod error;
mod fetch;
mod loader;
mod ports;
mod repo;

pub use check::{UnmetDependency, UnmetReason, constraint_matches, unmet_dependencies};
pub use ensure::ensure_dependencies;
pub use error::{BundleError, DependencyError, FetchStage};
pub use fetch::{FsDependencyFetcher, dependency_digest, find_in_repository};
pub use loader::{
    CHARTS_DIR, FsBundleLoader, LOCK_FILE, METADATA_FILE, TEMPLATES_DIR, VALUES_FILE,
    read_metadata,
};
pub use ports::{BundleLoader, DependencyFetcher};
pub use repo::RepositoryOptions;
