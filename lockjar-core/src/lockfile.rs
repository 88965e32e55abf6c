// lockjar-core/src/lockfile.rs
// Lock-file document: rendering from a resolved set, parsing back, and
// digest checks against it.

use std::collections::{BTreeMap, BTreeSet};

use lockjar_common::dependency::{DependencyInfo, ResolvedGraph};
use lockjar_common::error::{LockjarError, Result};
use lockjar_common::model::{Coordinates, DEFAULT_PACKAGING};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

pub const LOCK_FILE_VERSION: &str = "2";
pub const ARTIFACTS_HASH_KEY: &str = "__RESOLVED_ARTIFACTS_HASH";

/// Canonical form of a repository URI with any credentials dropped. A path
/// gets a trailing `/` unless a query or fragment follows it. Strings that
/// are not absolute URIs (`m2local/`) are kept as given.
pub fn normalize_repository(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    // Only URIs that cannot carry credentials reject these.
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let mut out = url.to_string();
    if url.query().is_none() && url.fragment().is_none() && !out.ends_with('/') {
        out.push('/');
    }
    out
}

fn dependency_keys(info: &DependencyInfo) -> Vec<String> {
    let keys: BTreeSet<String> = info.dependencies.iter().map(Coordinates::key).collect();
    keys.into_iter().collect()
}

/// Content hash over the resolved set: sha256 of the sorted
/// `coordinates | sha | deps` lines.
pub fn artifacts_hash(infos: &[DependencyInfo]) -> String {
    let mut lines: Vec<String> = infos
        .iter()
        .filter(|i| !i.missing)
        .map(|info| {
            format!(
                "{} | {} | {}",
                info.coordinates,
                info.sha256.as_deref().unwrap_or_default(),
                dependency_keys(info).join(",")
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Renders the lock-file document. Every map is key-sorted, so the same
/// inputs always produce the same text.
pub fn render(
    repositories: &[String],
    infos: &[DependencyInfo],
    conflict_resolution: &BTreeMap<Coordinates, Coordinates>,
) -> Value {
    let mut artifacts = Map::new();
    let mut dependencies = Map::new();
    let mut skipped = BTreeSet::new();

    for info in infos {
        let coords = &info.coordinates;
        if info.missing {
            skipped.insert(coords.to_string());
            continue;
        }

        let mut shasums = Map::new();
        match &info.sha256 {
            Some(sha) => {
                shasums.insert(
                    coords.classifier_or_default().to_string(),
                    Value::String(sha.clone()),
                );
            }
            None => {
                if !info.is_aggregator() {
                    skipped.insert(coords.to_string());
                }
            }
        }
        // Aggregators and undigested artifacts keep an explicit null.
        if shasums.is_empty() {
            shasums.insert(DEFAULT_PACKAGING.to_string(), Value::Null);
        }

        let mut entry = Map::new();
        entry.insert("shasums".into(), Value::Object(shasums));
        entry.insert("version".into(), Value::String(coords.version().to_string()));
        if coords.packaging() != DEFAULT_PACKAGING {
            entry.insert("packaging".into(), Value::String(coords.packaging().to_string()));
        }
        let repos: BTreeSet<String> = info
            .repositories
            .iter()
            .map(|r| normalize_repository(r))
            .collect();
        entry.insert("repositories".into(), json!(repos));
        artifacts.insert(coords.key(), Value::Object(entry));

        let deps = dependency_keys(info);
        if !deps.is_empty() {
            dependencies.insert(coords.key(), json!(deps));
        }
    }

    let repositories: BTreeSet<String> = repositories
        .iter()
        .map(|r| normalize_repository(r))
        .collect();

    let mut doc = Map::new();
    doc.insert(ARTIFACTS_HASH_KEY.into(), Value::String(artifacts_hash(infos)));
    doc.insert("artifacts".into(), Value::Object(artifacts));
    doc.insert("dependencies".into(), Value::Object(dependencies));
    doc.insert("repositories".into(), json!(repositories));
    doc.insert("skipped".into(), json!(skipped));
    if !conflict_resolution.is_empty() {
        let conflicts: BTreeMap<String, String> = conflict_resolution
            .iter()
            .map(|(requested, chosen)| (requested.to_string(), chosen.to_string()))
            .collect();
        doc.insert("conflict_resolution".into(), json!(conflicts));
    }
    doc.insert("version".into(), Value::String(LOCK_FILE_VERSION.into()));
    Value::Object(doc)
}

pub fn render_graph(repositories: &[String], graph: &ResolvedGraph) -> Value {
    render(repositories, &graph.dependency_infos(), &graph.conflict_resolution())
}

/// Pretty JSON with a trailing newline.
pub fn to_text(doc: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    Ok(text)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedArtifact {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    pub shasums: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub artifacts: BTreeMap<String, LockedArtifact>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<String>,
    #[serde(default)]
    pub conflict_resolution: BTreeMap<String, String>,
    #[serde(rename = "__RESOLVED_ARTIFACTS_HASH", default)]
    pub artifacts_hash: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl LockFile {
    pub fn parse(raw: &str) -> Result<Self> {
        let lock: LockFile = serde_json::from_str(raw)?;
        if let Some(version) = &lock.version {
            if version != LOCK_FILE_VERSION {
                return Err(LockjarError::ParseError(
                    "lock file",
                    format!("unsupported lock file version {version}"),
                ));
            }
        }
        debug!("Parsed lock file with {} artifacts", lock.artifacts.len());
        Ok(lock)
    }

    /// Every artifact payload with a recorded digest, as concrete coordinates.
    pub fn digests(&self) -> Result<Vec<(Coordinates, String)>> {
        let mut out = Vec::new();
        for (key, artifact) in &self.artifacts {
            let (group, name) = key.split_once(':').ok_or_else(|| {
                LockjarError::ParseError("lock file", format!("bad artifact key '{key}'"))
            })?;
            let packaging = artifact.packaging.as_deref().unwrap_or(DEFAULT_PACKAGING);
            for (classifier, sha) in &artifact.shasums {
                if let Some(sha) = sha {
                    let coords = Coordinates::new(group, name, packaging, classifier, artifact.version.clone());
                    out.push((coords, sha.clone()));
                }
            }
        }
        Ok(out)
    }

    /// Fails with `IntegrityError` when `actual` differs from the recorded
    /// digest. A recorded `null` has nothing to compare against.
    pub fn verify_digest(&self, key: &str, classifier: &str, actual: &str) -> Result<()> {
        let artifact = self
            .artifacts
            .get(key)
            .ok_or_else(|| LockjarError::NotFound(format!("{key} is not in the lock file")))?;
        match artifact.shasums.get(classifier) {
            Some(Some(expected)) if !expected.eq_ignore_ascii_case(actual) => {
                Err(LockjarError::IntegrityError(format!(
                    "{key}:{} ({classifier}) has sha256 {actual}, lock file expects {expected}",
                    artifact.version
                )))
            }
            Some(_) => Ok(()),
            None => Err(LockjarError::NotFound(format!(
                "{key} has no '{classifier}' entry in the lock file"
            ))),
        }
    }
}
