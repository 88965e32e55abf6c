// lockjar-common/src/catalog.rs
// Repository snapshot loaded from JSON, serving descriptors, version indexes
// and digests without any network access.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dependency::{DependencyEdge, Exclusion, Scope};
use crate::error::{LockjarError, Result};
use crate::model::Coordinates;
use crate::repository::{Descriptor, RepositoryClient, VersionIndex};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDependency {
    pub coordinates: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    #[serde(default)]
    pub packaging: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub managed: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<CatalogDependency>,
    /// Payload digests by classifier (`jar`, `sources`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shasums: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    /// Keyed by `group:artifact:version`.
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactEntry>,
    /// Keyed by `group:artifact`.
    #[serde(default)]
    pub metadata: BTreeMap<String, VersionIndex>,
    /// Simulates a repository that cannot be reached.
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub repositories: BTreeMap<String, RepositorySnapshot>,
}

fn gav_key(coords: &Coordinates) -> String {
    format!("{}:{}", coords.key(), coords.version())
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: Catalog = serde_json::from_str(raw)?;
        debug!("Parsed catalog with {} repositories", parsed.repositories.len());
        parsed.normalize()
    }

    /// Rewrites artifact keys to `group:artifact:version` so `g:a:jar:1.0`
    /// and `g:a:1.0` land on the same entry.
    pub fn normalize(mut self) -> Result<Self> {
        for snapshot in self.repositories.values_mut() {
            let mut artifacts = BTreeMap::new();
            for (raw, entry) in std::mem::take(&mut snapshot.artifacts) {
                let coords = Coordinates::parse(&raw)?;
                artifacts.insert(gav_key(&coords), entry);
            }
            snapshot.artifacts = artifacts;
        }
        Ok(self)
    }

    pub fn repository_urls(&self) -> Vec<String> {
        self.repositories.keys().cloned().collect()
    }

    pub fn add_artifact(&mut self, repository: &str, coords: &Coordinates, entry: ArtifactEntry) {
        let snapshot = self.repositories.entry(repository.to_string()).or_default();
        snapshot.artifacts.insert(gav_key(coords), entry);
        let index = snapshot.metadata.entry(coords.key()).or_default();
        if !index.versions.iter().any(|v| v == coords.version()) {
            index.versions.push(coords.version().to_string());
        }
    }

    pub fn set_metadata(&mut self, repository: &str, key: &str, index: VersionIndex) {
        self.repositories
            .entry(repository.to_string())
            .or_default()
            .metadata
            .insert(key.to_string(), index);
    }

    pub fn set_unavailable(&mut self, repository: &str) {
        self.repositories
            .entry(repository.to_string())
            .or_default()
            .unavailable = true;
    }

    fn snapshot(&self, repository: &str) -> Result<&RepositorySnapshot> {
        match self.repositories.get(repository) {
            Some(s) if s.unavailable => Err(LockjarError::RepositoryError(format!(
                "{repository} is unavailable"
            ))),
            Some(s) => Ok(s),
            None => Err(LockjarError::NotFound(format!(
                "repository {repository} is not in the catalog"
            ))),
        }
    }

    fn entry(&self, repository: &str, coords: &Coordinates) -> Result<&ArtifactEntry> {
        self.snapshot(repository)?
            .artifacts
            .get(&gav_key(coords))
            .ok_or_else(|| LockjarError::NotFound(format!("{coords} in {repository}")))
    }
}

impl ArtifactEntry {
    fn to_descriptor(&self, owner: &Coordinates) -> Result<Descriptor> {
        let dependencies = self
            .dependencies
            .iter()
            .map(|dep| -> Result<DependencyEdge> {
                let mut edge = DependencyEdge::new(
                    owner.clone(),
                    Coordinates::parse_target(&dep.coordinates)?,
                )
                .with_scope(dep.scope);
                edge.optional = dep.optional;
                for exclusion in &dep.exclusions {
                    edge.exclusions.insert(Exclusion::parse(exclusion)?);
                }
                Ok(edge)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Descriptor {
            packaging: if self.packaging.is_empty() {
                owner.packaging().to_string()
            } else {
                self.packaging.clone()
            },
            dependencies,
            parent: self
                .parent
                .as_deref()
                .map(Coordinates::parse)
                .transpose()?,
            managed_versions: self.managed.clone(),
        })
    }
}

impl RepositoryClient for Catalog {
    fn fetch_from(&self, repository: &str, coords: &Coordinates) -> Result<Descriptor> {
        self.entry(repository, coords)?.to_descriptor(coords)
    }

    fn version_index(&self, repository: &str, group: &str, artifact: &str) -> Result<VersionIndex> {
        self.snapshot(repository)?
            .metadata
            .get(&format!("{group}:{artifact}"))
            .cloned()
            .ok_or_else(|| {
                LockjarError::NotFound(format!("metadata for {group}:{artifact} in {repository}"))
            })
    }

    fn artifact_sha256(&self, repository: &str, coords: &Coordinates) -> Result<Option<String>> {
        Ok(self
            .entry(repository, coords)?
            .shasums
            .get(coords.classifier_or_default())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "repositories": {
        "https://repo.example/m2/": {
          "artifacts": {
            "com.example:app:jar:1.0": {
              "packaging": "jar",
              "parent": "com.example:parent:pom:1",
              "dependencies": [
                {"coordinates": "com.example:lib", "scope": "runtime", "exclusions": ["org.slf4j:*"]},
                {"coordinates": "junit:junit:4.13", "scope": "test"}
              ],
              "shasums": {"jar": "abc123"}
            }
          },
          "metadata": {
            "com.example:lib": {"versions": ["1.0", "1.1"], "release": "1.1"}
          }
        },
        "https://down.example/": {"unavailable": true}
      }
    }"#;

    #[test]
    fn descriptors_come_from_normalized_keys() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let app = Coordinates::parse("com.example:app:1.0").unwrap();
        let descriptor = catalog.fetch_from("https://repo.example/m2/", &app).unwrap();

        assert_eq!(descriptor.packaging, "jar");
        assert_eq!(
            descriptor.parent,
            Some(Coordinates::parse("com.example:parent:pom:1").unwrap())
        );
        assert_eq!(descriptor.dependencies.len(), 2);
        let lib = &descriptor.dependencies[0];
        assert_eq!(lib.from, app);
        assert!(!lib.to.has_version());
        assert_eq!(lib.scope, Scope::Runtime);
        assert!(lib.exclusions.iter().any(|x| x.matches(&Coordinates::jar("org.slf4j", "slf4j-api", "1"))));
        assert_eq!(descriptor.dependencies[1].scope, Scope::Test);
    }

    #[test]
    fn missing_and_unavailable_repositories() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let ghost = Coordinates::jar("com.example", "ghost", "1");
        assert!(matches!(
            catalog.fetch_from("https://repo.example/m2/", &ghost),
            Err(LockjarError::NotFound(_))
        ));
        assert!(matches!(
            catalog.fetch_from("https://down.example/", &ghost),
            Err(LockjarError::RepositoryError(_))
        ));
    }

    #[test]
    fn digests_and_metadata() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let repo = "https://repo.example/m2/";
        let app = Coordinates::jar("com.example", "app", "1.0");
        assert_eq!(
            catalog.artifact_sha256(repo, &app).unwrap(),
            Some("abc123".to_string())
        );
        let sources = Coordinates::new("com.example", "app", "jar", "sources", "1.0");
        assert_eq!(catalog.artifact_sha256(repo, &sources).unwrap(), None);

        let index = catalog.version_index(repo, "com.example", "lib").unwrap();
        assert_eq!(index.release.as_deref(), Some("1.1"));
    }

    #[test]
    fn builder_records_versions_in_metadata() {
        let mut catalog = Catalog::new();
        catalog.add_artifact("r", &Coordinates::jar("g", "a", "1.0"), ArtifactEntry::default());
        catalog.add_artifact("r", &Coordinates::jar("g", "a", "2.0"), ArtifactEntry::default());
        let index = catalog.version_index("r", "g", "a").unwrap();
        assert_eq!(index.versions, vec!["1.0", "2.0"]);
    }
}
