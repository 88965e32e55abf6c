use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LockjarError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    /// Transport-level failure reported by a repository client.
    #[error("Repository Error: {0}")]
    RepositoryError(String),

    #[error("Resolution Error: {0}")]
    ResolutionError(String),

    #[error("Integrity Error: {0}")]
    IntegrityError(String),

    #[error("Archive Error: {0}")]
    Archive(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl LockjarError {
    /// Builds the user-facing "could not resolve X because Y" error, naming the
    /// requester chain when there is one.
    pub fn unresolvable(target: impl AsRef<str>, reason: impl AsRef<str>, chain: &[String]) -> Self {
        let mut message = format!(
            "could not resolve {} because {}",
            target.as_ref(),
            reason.as_ref()
        );
        if !chain.is_empty() {
            message.push_str(&format!(" (requested via {})", chain.join(" -> ")));
        }
        LockjarError::ResolutionError(message)
    }

    /// Errors that end the whole run rather than a single artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LockjarError::ResolutionError(_)
                | LockjarError::IntegrityError(_)
                | LockjarError::RepositoryError(_)
        )
    }
}

impl From<std::io::Error> for LockjarError {
    fn from(err: std::io::Error) -> Self {
        LockjarError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for LockjarError {
    fn from(err: serde_json::Error) -> Self {
        LockjarError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LockjarError>;
