use crate::strvals::StrvalsError;
use std::fmt;
use thiserror::Error;

/// The command-line flag an inline override came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideFlag {
    Set,
    SetString,
    SetFile,
}

impl fmt::Display for OverrideFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideFlag::Set => f.write_str("--set"),
            OverrideFlag::SetString => f.write_str("--set-string"),
            OverrideFlag::SetFile => f.write_str("--set-file"),
        }
    }
}

/// Failures while resolving values. Each variant names the offending source.
#[derive(Debug, Error)]
pub enum ValuesError {
    /// Malformed `key=val` syntax in an inline override.
    #[error("failed parsing {flag} data {input:?}: {cause}")]
    Parse {
        flag: OverrideFlag,
        input: String,
        #[source]
        cause: StrvalsError,
    },

    /// A values file or URL could not be read.
    #[error("failed to read values source {origin}: {message}")]
    ReadSource { origin: String, message: String },

    /// A values file was read but is not a structured mapping document.
    #[error("failed to parse values source {origin}: {message}")]
    ParseSource { origin: String, message: String },

    /// A `--set-file` path could not be read.
    #[error("failed to read file for --set-file {key}={path}: {message}")]
    ReadFileValue {
        key: String,
        path: String,
        message: String,
    },
}

impl ValuesError {
    /// The file, URL or inline string that caused the failure.
    pub fn origin(&self) -> &str {
        match self {
            ValuesError::Parse { input, .. } => input,
            ValuesError::ReadSource { origin, .. } | ValuesError::ParseSource { origin, .. } => {
                origin
            }
            ValuesError::ReadFileValue { path, .. } => path,
        }
    }

    /// True for syntax errors in inline overrides, false for unreadable sources.
    pub fn is_syntax(&self) -> bool {
        matches!(self, ValuesError::Parse { .. })
    }
}
