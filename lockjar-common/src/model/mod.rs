// src/model/mod.rs
// Artifact identity and version ordering.
pub mod coordinates;
pub mod version;

// Re-export
pub use coordinates::{Coordinates, DEFAULT_PACKAGING};
pub use version::{Bound, Version, VersionRange};

/// Packaging of aggregator artifacts that publish metadata but no payload.
pub const AGGREGATOR_PACKAGING: &str = "pom";

pub fn is_aggregator(packaging: &str) -> bool {
    packaging == AGGREGATOR_PACKAGING
}
