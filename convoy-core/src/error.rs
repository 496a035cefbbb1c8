//! Error taxonomy for the deploy pipeline.
//!
//! Every variant carries the release name and maps to the phase it came from.
//! Exit code 2 = user-correctable block, 1 = everything else.

use convoy_bundle::{DependencyError, FetchStage};
use convoy_values::ValuesError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where in the pipeline an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Probe,
    Load,
    Dependency,
    Resolve,
    Execute,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::Probe => "probe",
            Phase::Load => "load",
            Phase::Dependency => "dependency",
            Phase::Resolve => "resolve",
            Phase::Execute => "execute",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutating operation a deploy dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Upgrade,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install => f.write_str("install"),
            Operation::Upgrade => f.write_str("upgrade"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    /// Malformed arguments, release name or override syntax.
    #[error("{message}")]
    Parse {
        release: String,
        phase: Phase,
        message: String,
    },

    #[error("{bundle_type} bundles are not installable")]
    NotInstallable { release: String, bundle_type: String },

    #[error("{source}")]
    DependencyUnsatisfied {
        release: String,
        #[source]
        source: DependencyError,
    },

    #[error("failed {stage}: {source:#}")]
    DependencyFetch {
        release: String,
        stage: FetchStage,
        #[source]
        source: anyhow::Error,
    },

    /// The probe could not verify whether the release exists.
    #[error("could not determine the state of release {release:?}: {source:#}")]
    StateProbe {
        release: String,
        #[source]
        source: anyhow::Error,
    },

    /// Install against an existing release, or upgrade against an absent one.
    #[error("{message}")]
    Precondition {
        release: String,
        operation: Operation,
        message: String,
    },

    #[error("{operation} of release {release:?} failed: {source:#}")]
    Execution {
        release: String,
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} of release {release:?} timed out after {}s", .timeout.as_secs())]
    Timeout {
        release: String,
        operation: Operation,
        timeout: Duration,
    },

    #[error("failed to load bundle {reference:?}: {source:#}")]
    BundleLoad {
        release: String,
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{source}")]
    Values {
        release: String,
        #[source]
        source: ValuesError,
    },
}

impl DeployError {
    pub fn release(&self) -> &str {
        match self {
            DeployError::Parse { release, .. }
            | DeployError::NotInstallable { release, .. }
            | DeployError::DependencyUnsatisfied { release, .. }
            | DeployError::DependencyFetch { release, .. }
            | DeployError::StateProbe { release, .. }
            | DeployError::Precondition { release, .. }
            | DeployError::Execution { release, .. }
            | DeployError::Timeout { release, .. }
            | DeployError::BundleLoad { release, .. }
            | DeployError::Values { release, .. } => release,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            DeployError::Parse { phase, .. } => *phase,
            DeployError::StateProbe { .. } => Phase::Probe,
            DeployError::NotInstallable { .. } | DeployError::BundleLoad { .. } => Phase::Load,
            DeployError::DependencyUnsatisfied { .. } | DeployError::DependencyFetch { .. } => {
                Phase::Dependency
            }
            DeployError::Values { .. } => Phase::Resolve,
            DeployError::Precondition { .. }
            | DeployError::Execution { .. }
            | DeployError::Timeout { .. } => Phase::Execute,
        }
    }

    /// Returns true if the user can fix this by changing the request (exit code 2).
    pub fn is_policy_block(&self) -> bool {
        matches!(
            self,
            DeployError::Precondition { .. }
                | DeployError::NotInstallable { .. }
                | DeployError::DependencyUnsatisfied { .. }
        )
    }

    /// Returns the recommended exit code for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_policy_block() { 2 } else { 1 }
    }

    pub(crate) fn from_dependency(release: &str, err: DependencyError) -> Self {
        match err {
            DependencyError::Fetch { stage, source } => DeployError::DependencyFetch {
                release: release.to_string(),
                stage,
                source,
            },
            unsatisfied @ DependencyError::Unsatisfied { .. } => {
                DeployError::DependencyUnsatisfied {
                    release: release.to_string(),
                    source: unsatisfied,
                }
            }
        }
    }

    pub(crate) fn from_values(release: &str, err: ValuesError) -> Self {
        if err.is_syntax() {
            return DeployError::Parse {
                release: release.to_string(),
                phase: Phase::Resolve,
                message: err.to_string(),
            };
        }
        DeployError::Values {
            release: release.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_values::OverrideFlag;

    #[test]
    fn policy_blocks_report_exit_code_2() {
        let err = DeployError::NotInstallable {
            release: "demo".to_string(),
            bundle_type: "library".to_string(),
        };
        assert!(err.is_policy_block());
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "library bundles are not installable");
        assert_eq!(err.phase(), Phase::Load);
        assert_eq!(err.release(), "demo");

        let err = DeployError::Precondition {
            release: "demo".to_string(),
            operation: Operation::Install,
            message: "cannot re-use a name that is still in use".to_string(),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.phase(), Phase::Execute);
    }

    #[test]
    fn runtime_errors_report_exit_code_1() {
        let err = DeployError::StateProbe {
            release: "demo".to_string(),
            source: anyhow::anyhow!("connection refused"),
        };
        assert!(!err.is_policy_block());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.phase(), Phase::Probe);
        assert!(err.to_string().contains("connection refused"));

        let err = DeployError::Timeout {
            release: "demo".to_string(),
            operation: Operation::Upgrade,
            timeout: Duration::from_secs(300),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "upgrade of release \"demo\" timed out after 300s"
        );
    }

    #[test]
    fn dependency_errors_keep_their_kind() {
        let unmet = DeployError::from_dependency(
            "demo",
            DependencyError::Unsatisfied { unmet: vec![] },
        );
        assert!(matches!(unmet, DeployError::DependencyUnsatisfied { .. }));
        assert_eq!(unmet.exit_code(), 2);

        let reload = DeployError::from_dependency(
            "demo",
            DependencyError::Fetch {
                stage: FetchStage::Reload,
                source: anyhow::anyhow!("bad"),
            },
        );
        assert!(matches!(
            reload,
            DeployError::DependencyFetch {
                stage: FetchStage::Reload,
                ..
            }
        ));
        assert_eq!(reload.exit_code(), 1);
        assert_eq!(reload.phase(), Phase::Dependency);
    }

    #[test]
    fn override_syntax_errors_become_parse_errors() {
        let syntax = ValuesError::Parse {
            flag: OverrideFlag::Set,
            input: "broken".to_string(),
            cause: convoy_values::strvals::StrvalsError::MissingValue {
                key: "broken".to_string(),
            },
        };
        let err = DeployError::from_values("demo", syntax);
        assert!(matches!(err, DeployError::Parse { phase: Phase::Resolve, .. }));

        let read = ValuesError::ReadSource {
            origin: "v.yaml".to_string(),
            message: "gone".to_string(),
        };
        let err = DeployError::from_values("demo", read);
        assert!(matches!(err, DeployError::Values { .. }));
        assert_eq!(err.phase(), Phase::Resolve);
    }
}
