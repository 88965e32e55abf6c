// lockjar-common/src/dependency/graph.rs
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dependency::DependencyEdge;
use crate::model::{is_aggregator, Coordinates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Resolved,
    /// No repository had a descriptor; kept as a leaf with no edges.
    Missing,
}

#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub coordinates: Coordinates,
    /// Surviving edges after scope/exclusion filtering, targets at their
    /// settled versions, in declaration order.
    pub direct_edges: Vec<DependencyEdge>,
    /// Repositories tried for the descriptor, in order.
    pub repositories: Vec<String>,
    pub served_by: Option<String>,
    pub sha256: Option<String>,
    pub status: NodeStatus,
}

impl ResolvedNode {
    pub fn is_aggregator(&self) -> bool {
        is_aggregator(self.coordinates.packaging())
    }
}

/// One requested version of an artifact and every chain that asked for it.
/// A chain runs from a root down to the requester, rendered as coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRequest {
    pub version: String,
    pub chains: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub chosen: String,
    /// All requested versions, the chosen one included, in first-seen order.
    pub requested: Vec<VersionRequest>,
}

impl ConflictRecord {
    pub fn rejected(&self) -> impl Iterator<Item = &VersionRequest> {
        self.requested.iter().filter(move |r| r.version != self.chosen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    /// `group:artifact` that was cut.
    pub target: String,
    pub reason: String,
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub roots: Vec<Coordinates>,
    /// Keyed by `group:artifact`; exactly one node per artifact.
    pub nodes: BTreeMap<String, ResolvedNode>,
    pub conflicts: BTreeMap<String, ConflictRecord>,
    pub omissions: Vec<Omission>,
    /// Back edges dropped to keep the graph acyclic, as (from, to) keys.
    pub broken_cycles: Vec<(String, String)>,
}

impl ResolvedGraph {
    pub fn node(&self, key: &str) -> Option<&ResolvedNode> {
        self.nodes.get(key)
    }

    pub fn version_of(&self, key: &str) -> Option<&str> {
        self.nodes.get(key).map(|n| n.coordinates.version())
    }

    pub fn missing(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes
            .values()
            .filter(|n| n.status == NodeStatus::Missing)
    }

    /// Requested version to chosen version, for every losing request.
    pub fn conflict_resolution(&self) -> BTreeMap<Coordinates, Coordinates> {
        let mut out = BTreeMap::new();
        for (key, record) in &self.conflicts {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            for rejected in record.rejected() {
                out.insert(
                    node.coordinates.with_version(rejected.version.clone()),
                    node.coordinates.clone(),
                );
            }
        }
        out
    }

    /// Flattened view consumed by the lock-file and rule emitters.
    pub fn dependency_infos(&self) -> Vec<DependencyInfo> {
        self.nodes
            .values()
            .map(|node| {
                let repositories = match &node.served_by {
                    Some(repo) => BTreeSet::from([repo.clone()]),
                    None => node.repositories.iter().cloned().collect(),
                };
                DependencyInfo {
                    coordinates: node.coordinates.clone(),
                    repositories,
                    sha256: node.sha256.clone(),
                    dependencies: node.direct_edges.iter().map(|e| e.to.clone()).collect(),
                    missing: node.status == NodeStatus::Missing,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyInfo {
    pub coordinates: Coordinates,
    pub repositories: BTreeSet<String>,
    pub sha256: Option<String>,
    pub dependencies: BTreeSet<Coordinates>,
    pub missing: bool,
}

impl DependencyInfo {
    pub fn is_aggregator(&self) -> bool {
        is_aggregator(self.coordinates.packaging())
    }
}
