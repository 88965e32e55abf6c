// lockjar-core/src/resolve/policy.rs
use std::fmt;

use lockjar_common::model::Version;

/// Picks one version when several are requested for the same artifact.
/// Called only once every request for the artifact is known.
pub trait ConflictPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `candidates` holds the distinct requested versions in first-seen order
    /// and is never empty.
    fn choose(&self, key: &str, candidates: &[String]) -> Option<String>;
}

/// Highest version wins; versions that compare equal fall back to the
/// lexically greater spelling so the outcome never depends on request order.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighestVersion;

impl ConflictPolicy for HighestVersion {
    fn name(&self) -> &str {
        "highest"
    }

    fn choose(&self, _key: &str, candidates: &[String]) -> Option<String> {
        candidates
            .iter()
            .max_by(|a, b| {
                Version::parse(a)
                    .cmp(&Version::parse(b))
                    .then_with(|| a.cmp(b))
            })
            .cloned()
    }
}

/// First requested version wins, the nearest-declaration rule of Maven.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstRequested;

impl ConflictPolicy for FirstRequested {
    fn name(&self) -> &str {
        "first"
    }

    fn choose(&self, _key: &str, candidates: &[String]) -> Option<String> {
        candidates.first().cloned()
    }
}

impl fmt::Debug for dyn ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConflictPolicy({})", self.name())
    }
}
