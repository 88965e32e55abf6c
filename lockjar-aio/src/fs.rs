// lockjar-aio/src/fs.rs
// File-system primitives shared by the CLI and the packager.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lockjar_common::error::{LockjarError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error};
use walkdir::WalkDir;

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        LockjarError::from(e)
    })
}

/// Writes `content` through a temporary file in the target directory and
/// renames it into place, so readers never observe a half-written file.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir_all(&dir)?;

    let mut temp_file = NamedTempFile::new_in(&dir)?;
    debug!(
        "Atomically writing {} bytes to {} via {}",
        content.len(),
        path.display(),
        temp_file.path().display()
    );
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist temporary file over {}: {}", path.display(), e.error);
        LockjarError::Io(Arc::new(e.error))
    })?;
    Ok(())
}

pub async fn atomic_write_file_async(path: &Path, content: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic_write_file(&path, &content))
        .await
        .map_err(|e| LockjarError::Generic(format!("write task failed: {e}")))?
}

pub async fn read_to_string_async(path: &Path) -> Result<String> {
    debug!("Reading file to string: {}", path.display());
    tokio::fs::read_to_string(path).await.map_err(|e| {
        error!("Failed read file {}: {}", path.display(), e);
        LockjarError::from(e)
    })
}

/// Copies `input` into `staging`. A file lands at the staging root under its
/// own name; a directory contributes its contents, relative to itself.
/// Returns the staged paths, relative to `staging`.
pub fn copy_into_staging(input: &Path, staging: &Path) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::new();

    if !input.is_dir() {
        let name = input.file_name().ok_or_else(|| {
            LockjarError::Generic(format!("{} has no file name", input.display()))
        })?;
        let target = staging.join(name);
        if target.exists() {
            return Err(LockjarError::Archive(format!(
                "{} would overwrite an already staged entry",
                input.display()
            )));
        }
        fs::copy(input, &target)?;
        staged.push(PathBuf::from(name));
        return Ok(staged);
    }

    for entry in WalkDir::new(input).follow_links(true).min_depth(1) {
        let entry = entry.map_err(|e| LockjarError::Generic(format!("walking {}: {e}", input.display())))?;
        let relative = entry
            .path()
            .strip_prefix(input)
            .map_err(|e| LockjarError::Generic(e.to_string()))?
            .to_path_buf();
        let target = staging.join(&relative);

        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            if target.exists() {
                return Err(LockjarError::Archive(format!(
                    "{} would overwrite an already staged entry",
                    entry.path().display()
                )));
            }
            if let Some(parent) = target.parent() {
                create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
        staged.push(relative);
    }
    debug!("Staged {} entries from {}", staged.len(), input.display());
    Ok(staged)
}
