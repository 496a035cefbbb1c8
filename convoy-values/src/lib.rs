//! Value resolution for convoy deploys.
//!
//! Layers configuration from values files, `--set-file`, `--set-string` and `--set`
//! overrides into one [`Values`](convoy_types::Values) tree. Precedence is fixed,
//! lowest to highest:
//!
//! 1. values files, in the order given
//! 2. `--set-file` entries
//! 3. `--set-string` entries
//! 4. `--set` entries
//!
//! All reads go through the [`SourceReader`] port; nothing else has side effects.

mod error;
mod merge;
mod options;
mod reader;
pub mod strvals;

pub use error::{OverrideFlag, ValuesError};
pub use merge::merge_values;
pub use options::{Layer, ValueOptions, resolve};
pub use reader::{FsSourceReader, SourceReader};
pub use strvals::ValueTyping;
