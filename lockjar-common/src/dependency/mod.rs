// src/dependency/mod.rs
pub mod definition;
pub mod graph;

pub use definition::{DependencyEdge, Exclusion, Scope};
pub use graph::{
    ConflictRecord, DependencyInfo, NodeStatus, Omission, ResolvedGraph, ResolvedNode,
    VersionRequest,
};
