//! Shared DTOs for the convoy workspace.
//!
//! # Design constraints
//! - `Release` records are serialized to disk by the filesystem release store.
//! - `BundleMetadata` and `BundleLock` mirror the on-disk `Bundle.yaml` / `Bundle.lock`.
//! - Prefer adding optional fields over changing semantics.

pub mod bundle;
pub mod release;

pub use bundle::{
    Bundle, BundleLock, BundleMetadata, BundleType, Dependency, LockedDependency, TemplateFile,
};
pub use release::{Hook, HookEvent, HookExecution, HookPhase, Release, ReleaseInfo, ReleaseStatus};

/// A configuration tree. Keys are kept in sorted order so rendering and
/// comparison are deterministic.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Schema identifiers.
pub mod schema {
    pub const CONVOY_RELEASE_V1: &str = "convoy.release.v1";
    pub const CONVOY_LOCK_V1: &str = "convoy.lock.v1";
}
