// lockjar-common/src/lib.rs
pub mod catalog;
pub mod config;
pub mod dependency;
pub mod error;
pub mod event;
pub mod model;
pub mod repository;

// Re-export key types
pub use catalog::Catalog;
pub use config::Config;
pub use error::{LockjarError, Result};
pub use event::{Event, EventListener, EventSink};
pub use model::{Coordinates, Version};
pub use repository::{Descriptor, RepositoryClient, VersionIndex};
