// lockjar-aio/src/pack.rs
// Deterministic zip packaging. Entry order, timestamps, permissions and
// compression are fixed, so identical input bytes give identical archives.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use lockjar_common::error::{LockjarError, Result};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, instrument};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::fs::{copy_into_staging, create_dir_all};

const CLASS_SUFFIX: &str = ".class";
const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

fn archive_error(e: impl std::fmt::Display) -> LockjarError {
    LockjarError::Archive(e.to_string())
}

/// Every entry is stamped 1985-02-01 00:00:00. Compiled classes get the
/// next representable tick (zip times have 2 second resolution) so a
/// compiler preferring the newer of a source/class pair picks the class.
pub fn entry_time(name: &str) -> Result<DateTime> {
    let second = if name.ends_with(CLASS_SUFFIX) { 2 } else { 0 };
    DateTime::from_date_and_time(1985, 2, 1, 0, 0, second).map_err(archive_error)
}

/// Forward-slash entry name for a staged path; directories end in `/`.
fn entry_name(relative: &Path, is_dir: bool) -> String {
    let mut name = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if is_dir {
        name.push('/');
    }
    name
}

/// Relative path and directory flag for everything under `root`, in
/// component-wise lexical order.
fn staged_entries(root: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| LockjarError::Generic(format!("walking staging area: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| LockjarError::Generic(e.to_string()))?
            .to_path_buf();
        entries.push((relative, entry.file_type().is_dir()));
    }
    entries.sort();
    Ok(entries)
}

/// Stages `inputs` and writes them to `output` as a zip archive. Plain file
/// inputs land at the archive root; directory inputs contribute their
/// contents. Two inputs staging the same path is an error.
#[instrument(skip_all, fields(output = %output.display()))]
pub fn pack(output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let staging = TempDir::new()?;
    for input in inputs {
        if !input.exists() {
            return Err(LockjarError::NotFound(format!(
                "input {} does not exist",
                input.display()
            )));
        }
        copy_into_staging(input, staging.path())?;
    }

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir_all(&dir)?;
    let mut temp = NamedTempFile::new_in(&dir)?;

    let entries = staged_entries(staging.path())?;
    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        for (relative, is_dir) in &entries {
            let name = entry_name(relative, *is_dir);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(entry_time(&name)?);

            if *is_dir {
                zip.add_directory(name, options.unix_permissions(DIR_MODE))
                    .map_err(archive_error)?;
            } else {
                zip.start_file(name, options.unix_permissions(FILE_MODE))
                    .map_err(archive_error)?;
                let mut source = File::open(staging.path().join(relative))?;
                io::copy(&mut source, &mut zip)?;
            }
        }
        zip.finish().map_err(archive_error)?;
    }

    temp.persist(output)
        .map_err(|e| LockjarError::Io(Arc::new(e.error)))?;
    debug!("Packed {} entries into {}", entries.len(), output.display());
    Ok(())
}
