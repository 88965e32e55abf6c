// lockjar-aio/src/checksum.rs
use std::path::Path;

use lockjar_common::error::Result;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Lowercase hex sha256 of a file's contents, hashed as it is read.
pub async fn sha256_file_async(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(8192);
    let mut total = 0u64;

    loop {
        buffer.clear();
        let n = file.read_buf(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    let actual = hex::encode(hasher.finalize());
    debug!("sha256 {} ({} bytes) = {}", path.display(), total, actual);
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use lockjar_common::error::LockjarError;

    use super::*;

    // sha256("hello\n")
    const HELLO: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[tokio::test]
    async fn digest_of_small_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello\n").unwrap();
        assert_eq!(sha256_file_async(file.path()).await.unwrap(), HELLO);
    }

    #[tokio::test]
    async fn digest_spans_several_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![7u8; 20_000];
        file.write_all(&payload).unwrap();
        assert_eq!(
            sha256_file_async(file.path()).await.unwrap(),
            hex::encode(Sha256::digest(&payload))
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_file_async(&dir.path().join("absent.jar")).await.unwrap_err();
        assert!(matches!(err, LockjarError::Io(_)));
    }
}
