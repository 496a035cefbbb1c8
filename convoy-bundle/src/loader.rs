use crate::error::BundleError;
use crate::ports::BundleLoader;
use camino::{Utf8Path, Utf8PathBuf};
use convoy_types::{Bundle, BundleLock, BundleMetadata, TemplateFile, Values};
use fs_err as fs;
use glob::glob;
use tracing::debug;
use walkdir::WalkDir;

pub const METADATA_FILE: &str = "Bundle.yaml";
pub const VALUES_FILE: &str = "values.yaml";
pub const LOCK_FILE: &str = "Bundle.lock";
pub const TEMPLATES_DIR: &str = "templates";
pub const CHARTS_DIR: &str = "charts";

/// Loads bundle directories from disk, including sub-bundles under `charts/`.
#[derive(Debug, Clone, Default)]
pub struct FsBundleLoader;

impl FsBundleLoader {
    pub fn load_dir(&self, path: &Utf8Path) -> Result<Bundle, BundleError> {
        if !path.is_dir() {
            return Err(BundleError::NotFound {
                path: path.to_string(),
            });
        }

        let metadata = read_metadata(path)?;
        let values = read_values(&path.join(VALUES_FILE))?;
        let templates = read_templates(path)?;
        let lock = read_lock(&path.join(LOCK_FILE))?;

        let mut dependencies = Vec::new();
        for sub in sub_bundle_dirs(path)? {
            dependencies.push(self.load_dir(&sub)?);
        }

        debug!(
            path = %path,
            bundle = metadata.name.as_str(),
            version = metadata.version.as_str(),
            templates = templates.len(),
            sub_bundles = dependencies.len(),
            "loaded bundle"
        );

        Ok(Bundle {
            metadata,
            values,
            templates,
            dependencies,
            lock,
        })
    }
}

impl BundleLoader for FsBundleLoader {
    fn load(&self, path: &Utf8Path) -> anyhow::Result<Bundle> {
        Ok(self.load_dir(path)?)
    }
}

/// Parse and validate `<dir>/Bundle.yaml`.
pub fn read_metadata(dir: &Utf8Path) -> Result<BundleMetadata, BundleError> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Err(BundleError::MissingMetadata {
            path: dir.to_string(),
        });
    }
    let text = read_to_string(&path)?;
    let metadata: BundleMetadata = serde_yaml::from_str(&text).map_err(|e| BundleError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    if metadata.name.trim().is_empty() {
        return Err(BundleError::Invalid {
            path: path.to_string(),
            message: "name is required".to_string(),
        });
    }
    if metadata.version.trim().is_empty() {
        return Err(BundleError::Invalid {
            path: path.to_string(),
            message: "version is required".to_string(),
        });
    }
    Ok(metadata)
}

fn read_values(path: &Utf8Path) -> Result<Values, BundleError> {
    if !path.is_file() {
        return Ok(Values::new());
    }
    let text = read_to_string(path)?;
    let doc: serde_json::Value = serde_yaml::from_str(&text).map_err(|e| BundleError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    match doc {
        serde_json::Value::Null => Ok(Values::new()),
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(BundleError::Parse {
            path: path.to_string(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

fn read_templates(dir: &Utf8Path) -> Result<Vec<TemplateFile>, BundleError> {
    let root = dir.join(TEMPLATES_DIR);
    if !root.is_dir() {
        return Ok(vec![]);
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| BundleError::Io {
            path: root.to_string(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.path().to_path_buf()).map_err(|p| {
            BundleError::Invalid {
                path: p.display().to_string(),
                message: "template path is not valid UTF-8".to_string(),
            }
        })?;
        let name = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .as_str()
            .replace('\\', "/");
        let data = read_to_string(&path)?;
        out.push(TemplateFile { name, data });
    }
    Ok(out)
}

fn read_lock(path: &Utf8Path) -> Result<Option<BundleLock>, BundleError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = read_to_string(path)?;
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|e| BundleError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
}

fn sub_bundle_dirs(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, BundleError> {
    let pattern = dir.join(CHARTS_DIR).join("*").join(METADATA_FILE);
    let entries = glob(pattern.as_str()).map_err(|e| BundleError::Invalid {
        path: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut out = Vec::new();
    for entry in entries {
        let file = entry.map_err(|e| BundleError::Io {
            path: pattern.to_string(),
            message: e.to_string(),
        })?;
        let file = Utf8PathBuf::from(file.to_string_lossy().to_string());
        if let Some(parent) = file.parent() {
            out.push(parent.to_path_buf());
        }
    }
    // Deterministic order matters.
    out.sort();
    Ok(out)
}

fn read_to_string(path: &Utf8Path) -> Result<String, BundleError> {
    fs::read_to_string(path).map_err(|e| BundleError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })
}
