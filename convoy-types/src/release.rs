use crate::Values;
use crate::bundle::BundleMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One revision of a named, namespaced deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub schema: String,
    pub name: String,
    pub namespace: String,

    /// Starts at 1 on install and increases by one per successful upgrade.
    pub revision: u32,

    pub info: ReleaseInfo,
    pub bundle: BundleMetadata,

    /// User-supplied configuration applied at this revision.
    #[serde(default)]
    pub config: Values,

    #[serde(default)]
    pub manifest: String,

    #[serde(default)]
    pub hooks: Vec<Hook>,
}

impl Release {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        revision: u32,
        bundle: BundleMetadata,
    ) -> Self {
        Self {
            schema: crate::schema::CONVOY_RELEASE_V1.to_string(),
            name: name.into(),
            namespace: namespace.into(),
            revision,
            info: ReleaseInfo::default(),
            bundle,
            config: Values::new(),
            manifest: String::new(),
            hooks: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub status: ReleaseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_deployed: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deployed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Pending,
    Deployed,
    Failed,
    Superseded,
}

impl ReleaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle hook attached to a release and its most recent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,

    /// Template path the hook was rendered from.
    pub path: String,

    #[serde(default)]
    pub events: Vec<HookEvent>,

    #[serde(default)]
    pub manifest: String,

    #[serde(default)]
    pub last_run: HookExecution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    PreInstall,
    PostInstall,
    PreUpgrade,
    PostUpgrade,
    Test,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookExecution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub phase: HookPhase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookPhase {
    #[default]
    Unknown,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookPhase::Unknown => "Unknown",
            HookPhase::Running => "Running",
            HookPhase::Succeeded => "Succeeded",
            HookPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}
