//! BDD harness (cucumber-rs).
//!
//! Scenario tests drive the `convoy` binary against throwaway directories.

/// Directory the CLI stores releases under when run with default paths.
pub const STATE_DIR: &str = ".convoy/releases";

/// Path of one stored revision, relative to the working directory.
pub fn release_record(namespace: &str, name: &str, revision: u32) -> String {
    format!("{STATE_DIR}/{namespace}/{name}/{revision}.json")
}
