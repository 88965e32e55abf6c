// lockjar-core/src/resolve/mod.rs
// Dependency resolution: parallel discovery, then a pure settlement pass.
mod discover;
mod engine;
mod flight;
mod policy;
mod request;
mod settle;

pub use engine::{
    resolve, Resolver, ResolverOptions, PHASE_DOWNLOADING, PHASE_RESOLVING, PHASE_WRITING,
};
pub use flight::SingleFlight;
pub use policy::{ConflictPolicy, FirstRequested, HighestVersion};
pub use request::{ResolutionRequest, RootArtifact};
