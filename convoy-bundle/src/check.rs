use convoy_types::Bundle;
use semver::{Version, VersionReq};
use std::fmt;

/// A declared dependency with no acceptable sub-bundle under `charts/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetDependency {
    pub name: String,
    pub constraint: String,
    pub reason: UnmetReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmetReason {
    Missing,
    VersionMismatch { found: String },
    InvalidConstraint { message: String },
    InvalidVersion { found: String },
}

impl fmt::Display for UnmetDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnmetReason::Missing => write!(f, "{} (missing)", self.name),
            UnmetReason::VersionMismatch { found } => write!(
                f,
                "{} (found {found}, wanted {})",
                self.name, self.constraint
            ),
            UnmetReason::InvalidConstraint { message } => write!(
                f,
                "{} (invalid constraint {:?}: {message})",
                self.name, self.constraint
            ),
            UnmetReason::InvalidVersion { found } => {
                write!(f, "{} (sub-bundle version {found:?} is not semver)", self.name)
            }
        }
    }
}

/// Check `version` against a semver requirement. An empty requirement matches anything.
pub fn constraint_matches(constraint: &str, version: &str) -> Result<bool, String> {
    let constraint = constraint.trim();
    let version = parse_version(version).ok_or_else(|| format!("{version:?} is not semver"))?;
    if constraint.is_empty() || constraint == "*" {
        return Ok(true);
    }
    let req = VersionReq::parse(constraint).map_err(|e| e.to_string())?;
    Ok(req.matches(&version))
}

pub(crate) fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(raw).ok()
}

/// Every declared dependency that has no matching sub-bundle, in declaration order.
pub fn unmet_dependencies(bundle: &Bundle) -> Vec<UnmetDependency> {
    let mut unmet = Vec::new();

    for dep in &bundle.metadata.dependencies {
        let entry = |reason| UnmetDependency {
            name: dep.name.clone(),
            constraint: dep.version.clone(),
            reason,
        };

        let Some(sub) = bundle.sub_bundle(&dep.name) else {
            unmet.push(entry(UnmetReason::Missing));
            continue;
        };

        if parse_version(sub.version()).is_none() {
            unmet.push(entry(UnmetReason::InvalidVersion {
                found: sub.version().to_string(),
            }));
            continue;
        }

        match constraint_matches(&dep.version, sub.version()) {
            Ok(true) => {}
            Ok(false) => unmet.push(entry(UnmetReason::VersionMismatch {
                found: sub.version().to_string(),
            })),
            Err(message) => unmet.push(entry(UnmetReason::InvalidConstraint { message })),
        }
    }

    unmet
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_types::{BundleMetadata, Dependency};
    use pretty_assertions::assert_eq;

    fn bundle(name: &str, version: &str) -> Bundle {
        Bundle {
            metadata: BundleMetadata {
                name: name.to_string(),
                version: version.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn dep(name: &str, version: &str) -> Dependency {
        Dependency {
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn constraint_matching() {
        assert_eq!(constraint_matches("", "1.2.3"), Ok(true));
        assert_eq!(constraint_matches("*", "0.0.1"), Ok(true));
        assert_eq!(constraint_matches(">=1.0.0, <2.0.0", "1.5.0"), Ok(true));
        assert_eq!(constraint_matches(">=1.0.0, <2.0.0", "2.0.0"), Ok(false));
        assert_eq!(constraint_matches("^1.2", "v1.9.0"), Ok(true));
        assert!(constraint_matches("not a range", "1.0.0").is_err());
        assert!(constraint_matches("^1", "latest").is_err());
    }

    #[test]
    fn no_dependencies_means_nothing_unmet() {
        assert!(unmet_dependencies(&bundle("app", "1.0.0")).is_empty());
    }

    #[test]
    fn reports_missing_mismatched_and_invalid() {
        let mut app = bundle("app", "1.0.0");
        app.metadata.dependencies = vec![
            dep("present", "^1"),
            dep("absent", "^1"),
            dep("old", ">=2.0.0"),
            dep("weird", "~~"),
        ];
        app.dependencies = vec![
            bundle("present", "1.4.0"),
            bundle("old", "1.0.0"),
            bundle("weird", "1.0.0"),
        ];

        let unmet = unmet_dependencies(&app);
        let names: Vec<_> = unmet.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["absent", "old", "weird"]);
        assert_eq!(unmet[0].reason, UnmetReason::Missing);
        assert_eq!(
            unmet[1].reason,
            UnmetReason::VersionMismatch {
                found: "1.0.0".to_string()
            }
        );
        assert!(matches!(unmet[2].reason, UnmetReason::InvalidConstraint { .. }));
    }

    #[test]
    fn non_semver_sub_bundle_is_unmet() {
        let mut app = bundle("app", "1.0.0");
        app.metadata.dependencies = vec![dep("db", "")];
        app.dependencies = vec![bundle("db", "latest")];
        let unmet = unmet_dependencies(&app);
        assert_eq!(unmet.len(), 1);
        assert!(unmet[0].to_string().contains("not semver"));
    }
}
