//! Port for reading values sources, plus the filesystem-backed default.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Reads the raw bytes of a values file, URL or `--set-file` path.
pub trait SourceReader {
    fn read(&self, source: &str) -> anyhow::Result<Vec<u8>>;
}

/// Reads local paths from disk and delegates `scheme://` sources to registered readers.
///
/// Relative paths resolve against `base_dir` when one is set. A URL whose scheme has
/// no registered reader is an error rather than a path lookup.
#[derive(Default)]
pub struct FsSourceReader {
    base_dir: Option<Utf8PathBuf>,
    schemes: BTreeMap<String, Box<dyn SourceReader + Send + Sync>>,
}

impl FsSourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Register a reader for `scheme://...` sources.
    pub fn with_scheme(
        mut self,
        scheme: impl Into<String>,
        reader: Box<dyn SourceReader + Send + Sync>,
    ) -> Self {
        self.schemes.insert(scheme.into().to_ascii_lowercase(), reader);
        self
    }

    fn resolve_path(&self, source: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(source);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl fmt::Debug for FsSourceReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsSourceReader")
            .field("base_dir", &self.base_dir)
            .field("schemes", &self.schemes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceReader for FsSourceReader {
    fn read(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(scheme) = url_scheme(source) {
            if scheme == "file" {
                let path = &source["file://".len()..];
                return Ok(fs_err::read(self.resolve_path(path).into_std_path_buf())?);
            }
            let reader = self
                .schemes
                .get(&scheme)
                .with_context(|| format!("no reader registered for scheme {scheme:?}"))?;
            debug!(source, scheme = scheme.as_str(), "reading values via scheme reader");
            return reader.read(source);
        }

        let path = self.resolve_path(source);
        debug!(path = path.as_str(), "reading values file");
        Ok(fs_err::read(path.into_std_path_buf())?)
    }
}

/// Lowercased scheme of `scheme://rest`, if `source` looks like a URL.
fn url_scheme(source: &str) -> Option<String> {
    let (scheme, _) = source.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme.to_ascii_lowercase())
    } else {
        None
    }
}
