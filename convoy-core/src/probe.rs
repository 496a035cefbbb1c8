//! State Prober: decides whether a release verifiably exists.

use crate::ports::{ProbeError, ReleaseProbe};
use convoy_types::Release;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Verified nonexistent.
    Absent,
    Present(Box<Release>),
}

/// Look up `name` without side effects.
///
/// Only a confirmed not-found is `Absent`. Any other failure is returned, since the
/// release may well exist.
pub fn probe(
    backend: &dyn ReleaseProbe,
    namespace: &str,
    name: &str,
) -> Result<ProbeOutcome, anyhow::Error> {
    match backend.probe_release(namespace, name) {
        Ok(release) => {
            debug!(
                release = name,
                namespace,
                revision = release.revision,
                status = %release.info.status,
                "release found"
            );
            Ok(ProbeOutcome::Present(Box::new(release)))
        }
        Err(ProbeError::NotFound) => {
            debug!(release = name, namespace, "release not found");
            Ok(ProbeOutcome::Absent)
        }
        Err(ProbeError::Unavailable(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_types::BundleMetadata;

    struct Fixed(fn() -> Result<Release, ProbeError>);

    impl ReleaseProbe for Fixed {
        fn probe_release(&self, _: &str, _: &str) -> Result<Release, ProbeError> {
            (self.0)()
        }
    }

    #[test]
    fn not_found_is_absent() {
        let out = probe(&Fixed(|| Err(ProbeError::NotFound)), "default", "demo").unwrap();
        assert_eq!(out, ProbeOutcome::Absent);
    }

    #[test]
    fn found_is_present() {
        let out = probe(
            &Fixed(|| Ok(Release::new("demo", "default", 2, BundleMetadata::default()))),
            "default",
            "demo",
        )
        .unwrap();
        match out {
            ProbeOutcome::Present(r) => assert_eq!(r.revision, 2),
            ProbeOutcome::Absent => panic!("expected present"),
        }
    }

    #[test]
    fn unavailable_is_never_absent() {
        let err = probe(
            &Fixed(|| Err(ProbeError::Unavailable(anyhow::anyhow!("connection refused")))),
            "default",
            "demo",
        )
        .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
