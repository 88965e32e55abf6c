// lockjar-common/src/repository.rs
// Boundary to whatever actually talks to Maven repositories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dependency::DependencyEdge;
use crate::error::{LockjarError, Result};
use crate::model::{Coordinates, Version};

/// Per-artifact metadata as published by a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub packaging: String,
    pub dependencies: Vec<DependencyEdge>,
    /// Parent descriptor supplying inherited managed versions.
    pub parent: Option<Coordinates>,
    /// `group:artifact` to version, from dependency management and imports.
    pub managed_versions: BTreeMap<String, String>,
}

/// Per-`group:artifact` version listing (`maven-metadata.xml` equivalent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndex {
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

fn highest<'a>(versions: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    versions.max_by(|a, b| Version::parse(a).cmp(&Version::parse(b)).then_with(|| a.cmp(b)))
}

fn is_pre_release(version: &str) -> bool {
    Version::parse(version).is_pre_release()
}

impl VersionIndex {
    fn marker(marker: &Option<String>) -> Option<&str> {
        marker.as_deref().filter(|m| !m.is_empty())
    }

    /// The release marker, else the highest listed version, skipping
    /// pre-releases either way.
    pub fn newest_release(&self) -> Option<&str> {
        match Self::marker(&self.release) {
            Some(release) if !is_pre_release(release) => Some(release),
            _ => highest(self.versions.iter().map(String::as_str).filter(|v| !is_pre_release(v))),
        }
    }

    /// Highest pre-release among the release marker, the latest marker and
    /// the top of the listing.
    pub fn newest_pre_release(&self) -> Option<&str> {
        let top = highest(self.versions.iter().map(String::as_str));
        let pointers = [Self::marker(&self.release), Self::marker(&self.latest), top];
        highest(pointers.into_iter().flatten().filter(|v| is_pre_release(v)))
    }
}

#[derive(Debug, Clone)]
pub struct FetchedDescriptor {
    pub descriptor: Descriptor,
    /// Repositories consulted, in order, up to and including the one that answered.
    pub repositories: Vec<String>,
    pub served_by: String,
}

/// Transport collaborator. Implementations return `NotFound` when a
/// repository simply lacks the artifact and `RepositoryError` (or `Io`) for
/// transport failures.
pub trait RepositoryClient: Send + Sync {
    fn fetch_from(&self, repository: &str, coords: &Coordinates) -> Result<Descriptor>;

    fn version_index(&self, repository: &str, group: &str, artifact: &str) -> Result<VersionIndex>;

    /// Digest of the artifact payload, `None` when the repository publishes none.
    fn artifact_sha256(&self, repository: &str, coords: &Coordinates) -> Result<Option<String>>;

    /// Tries `repositories` in order; the first success wins. All repositories
    /// reporting `NotFound` yields `NotFound`; if any failed at the transport
    /// level and none succeeded the result is a `RepositoryError`.
    fn fetch_descriptor(
        &self,
        coords: &Coordinates,
        repositories: &[String],
    ) -> Result<FetchedDescriptor> {
        let mut tried = Vec::with_capacity(repositories.len());
        let mut transport_failures = Vec::new();

        for repo in repositories {
            tried.push(repo.clone());
            match self.fetch_from(repo, coords) {
                Ok(descriptor) => {
                    debug!("Descriptor for {} served by {}", coords, repo);
                    return Ok(FetchedDescriptor {
                        descriptor,
                        repositories: tried,
                        served_by: repo.clone(),
                    });
                }
                Err(LockjarError::NotFound(_)) => {
                    debug!("{} not found in {}", coords, repo);
                }
                Err(e) => {
                    warn!("Fetching {} from {} failed: {}", coords, repo, e);
                    transport_failures.push(format!("{repo}: {e}"));
                }
            }
        }

        if transport_failures.is_empty() {
            Err(LockjarError::NotFound(format!(
                "{coords} in any of [{}]",
                repositories.join(", ")
            )))
        } else {
            Err(LockjarError::RepositoryError(format!(
                "could not fetch {coords}: {}",
                transport_failures.join("; ")
            )))
        }
    }
}
