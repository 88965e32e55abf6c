// lockjar-aio/src/json_io.rs
use std::path::Path;

use lockjar_common::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Pretty-printed JSON with a trailing newline, written atomically.
pub async fn write_json_async<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let mut bytes = serde_json::to_vec_pretty(data)?;
    bytes.push(b'\n');
    crate::fs::atomic_write_file_async(path, bytes).await
}

pub async fn read_json_async<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
