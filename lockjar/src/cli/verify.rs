//! Contains the logic for the `verify` command.
use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use lockjar_aio::{read_to_string_async, sha256_file_async};
use lockjar_common::error::Result;
use lockjar_core::lockfile::LockFile;
use tracing::{debug, warn};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[arg(long)]
    pub lock_file: PathBuf,

    /// Root of a Maven-layout repository holding the downloaded artifacts.
    #[arg(long)]
    pub local_repository: PathBuf,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub verified: usize,
    pub absent: usize,
}

/// Recomputes every recorded digest under `root`. A mismatch stops at the
/// first offender; a file that is not there only warns.
pub async fn verify_lock_file(lock: &LockFile, root: &Path) -> Result<VerifySummary> {
    let mut summary = VerifySummary::default();
    for (coords, _) in lock.digests()? {
        let path = root.join(coords.repository_path());
        if !path.is_file() {
            warn!("{} is not present at {}", coords, path.display());
            eprintln!(
                "{} {} is not present at {}",
                "Warning:".yellow(),
                coords,
                path.display()
            );
            summary.absent += 1;
            continue;
        }
        let actual = sha256_file_async(&path).await?;
        lock.verify_digest(&coords.key(), coords.classifier_or_default(), &actual)?;
        debug!("{} matches", coords);
        summary.verified += 1;
    }
    Ok(summary)
}

impl VerifyArgs {
    pub async fn run(&self) -> Result<()> {
        let lock = LockFile::parse(&read_to_string_async(&self.lock_file).await?)?;
        let summary = verify_lock_file(&lock, &self.local_repository).await?;
        println!(
            "Verified {} artifacts, {} not present locally",
            summary.verified, summary.absent
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lockjar_common::error::LockjarError;

    use super::*;

    // sha256("payload")
    const PAYLOAD: &str = "239f59ed55e737c77147cf55ad0c1b030b6d7ee748a7426952f9b852d5a935e5";

    fn lock(sha: &str) -> LockFile {
        LockFile::parse(&format!(
            r#"{{
              "artifacts": {{
                "com.example:lib": {{"shasums": {{"jar": "{sha}"}}, "version": "1.0"}},
                "com.example:gone": {{"shasums": {{"jar": "{sha}"}}, "version": "2.0"}},
                "com.example:bom": {{"shasums": {{"jar": null}}, "version": "3", "packaging": "pom"}}
              }},
              "repositories": ["https://repo.example/"],
              "version": "2"
            }}"#
        ))
        .unwrap()
    }

    fn local_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("com/example/lib/1.0/lib-1.0.jar");
        fs::create_dir_all(jar.parent().unwrap()).unwrap();
        fs::write(&jar, "payload").unwrap();
        dir
    }

    #[tokio::test]
    async fn matching_digests_pass_and_absent_files_warn() {
        let repo = local_repo();
        let summary = verify_lock_file(&lock(PAYLOAD), repo.path()).await.unwrap();
        assert_eq!(summary, VerifySummary { verified: 1, absent: 1 });
    }

    #[tokio::test]
    async fn tampered_artifact_is_an_integrity_error() {
        let repo = local_repo();
        let err = verify_lock_file(&lock(&"0".repeat(64)), repo.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LockjarError::IntegrityError(_)));
    }
}
