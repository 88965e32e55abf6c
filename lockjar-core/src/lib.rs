// lockjar-core/src/lib.rs
pub mod lockfile;
pub mod outdated;
pub mod resolve;
pub mod rules;

pub use lockfile::LockFile;
pub use outdated::{check_outdated, OutdatedReport, UpdateInfo};
pub use resolve::{
    resolve, ConflictPolicy, HighestVersion, ResolutionRequest, Resolver, ResolverOptions,
};
pub use rules::{render_rules, RuleSettings};
