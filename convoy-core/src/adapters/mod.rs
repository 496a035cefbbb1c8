//! Default port implementations.
//!
//! - [`FsReleaseStore`] keeps release revisions as JSON files under a state directory.
//! - [`FsBundleLocator`] resolves local paths and `repo/name` references.
//! - The `InMemory*` adapters hold everything in memory and record every call, for
//!   embedding and tests.

mod fs_store;
mod locator;
mod memory;

pub use convoy_bundle::{FsBundleLoader, FsDependencyFetcher};
pub use convoy_values::FsSourceReader;
pub use fs_store::{FsReleaseStore, render_manifest};
pub use locator::FsBundleLocator;
pub use memory::{
    ExecutorCall, InMemoryBundles, InMemoryReleaseStore, InMemorySources, InjectedFailure,
};
