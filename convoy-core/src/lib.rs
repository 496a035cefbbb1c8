//! Embeddable deploy pipeline for convoy.
//!
//! Provides a clap-free, I/O-abstracted `deploy` entry point: probe the release,
//! then install it if absent or upgrade it if present.
//!
//! # Port traits
//!
//! All collaborators are reached through traits in [`ports`]:
//! - [`ReleaseProbe`](ports::ReleaseProbe): read-only release lookup
//! - [`ReleaseExecutor`](ports::ReleaseExecutor): install/upgrade convergence
//! - [`BundleLocator`](ports::BundleLocator): reference → local bundle path
//! - [`BundleLoader`](ports::BundleLoader), [`DependencyFetcher`](ports::DependencyFetcher),
//!   [`SourceReader`](ports::SourceReader): bundle and value storage
//!
//! The [`adapters`] module provides filesystem-backed and in-memory implementations.
//!
//! # Entry point
//!
//! - [`deploy`](pipeline::deploy): converge one release

pub mod adapters;
pub mod error;
pub mod name;
pub mod operations;
pub mod pipeline;
pub mod ports;
pub mod probe;
pub mod settings;

pub use error::{DeployError, Operation, Phase};
pub use pipeline::{DeployOutcome, DeployPorts, DeployState, deploy};
pub use settings::{DEFAULT_TIMEOUT, DeployRequest, DeploySettings};

// Re-export so embedders don't need convoy-bundle / convoy-values directly.
pub use convoy_bundle::{FetchStage, RepositoryOptions};
pub use convoy_values::ValueOptions;
