use crate::Values;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `Bundle.yaml` metadata of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    pub name: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<BundleType>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl BundleMetadata {
    /// Only application bundles (or bundles with no declared type) can be deployed.
    pub fn is_installable(&self) -> bool {
        self.bundle_type
            .as_ref()
            .is_none_or(BundleType::is_installable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Application,
    Library,
    #[serde(untagged)]
    Other(String),
}

impl BundleType {
    pub fn is_installable(&self) -> bool {
        match self {
            BundleType::Application => true,
            BundleType::Library => false,
            BundleType::Other(kind) => kind.is_empty(),
        }
    }
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleType::Application => f.write_str("application"),
            BundleType::Library => f.write_str("library"),
            BundleType::Other(kind) => f.write_str(kind),
        }
    }
}

/// A declared dependency on another bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    /// Semver requirement. Empty matches any version.
    #[serde(default)]
    pub version: String,

    /// Repository alias (`@stable`, `alias:stable`) or `file://` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A template file carried by a bundle, keyed by its path relative to the bundle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub name: String,
    pub data: String,
}

/// An immutable, fully loaded bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub metadata: BundleMetadata,

    /// Defaults from `values.yaml`.
    pub values: Values,

    pub templates: Vec<TemplateFile>,

    /// Sub-bundles physically present under `charts/`.
    pub dependencies: Vec<Bundle>,

    pub lock: Option<BundleLock>,
}

impl Bundle {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn is_installable(&self) -> bool {
        self.metadata.is_installable()
    }

    /// Physically present sub-bundle with the given name.
    pub fn sub_bundle(&self, name: &str) -> Option<&Bundle> {
        self.dependencies.iter().find(|b| b.name() == name)
    }
}

/// Contents of `Bundle.lock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleLock {
    pub schema: String,

    /// sha256 over the declared dependency list the lock was generated from.
    pub digest: String,

    pub generated: DateTime<Utc>,

    #[serde(default)]
    pub dependencies: Vec<LockedDependency>,
}

impl BundleLock {
    pub fn new(digest: String, generated: DateTime<Utc>) -> Self {
        Self {
            schema: crate::schema::CONVOY_LOCK_V1.to_string(),
            digest,
            generated,
            dependencies: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub name: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}
