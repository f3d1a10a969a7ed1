// sprig-aio/src/checksum.rs
use std::path::Path;

use sha2::{Digest, Sha256};
use sprig_common::error::{Result, SprigError};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Hashes the complete content of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let std_file = std::fs::File::open(path)?;
    let mut std_reader = std::io::BufReader::new(std_file);
    let mut hasher = Sha256::new();
    let bytes_copied = std::io::copy(&mut std_reader, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    debug!(
        "Calculated SHA256 of {}: {} ({} bytes read)",
        path.display(),
        actual,
        bytes_copied
    );
    Ok(actual)
}

/// Asynchronously hashes the complete content of a file.
/// Reads the file asynchronously but performs hashing synchronously.
pub async fn sha256_file_async(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(8192);
    let mut total_bytes_read: u64 = 0;

    loop {
        buffer.clear();
        match file.read_buf(&mut buffer).await? {
            0 => break,
            n => {
                hasher.update(&buffer[..n]);
                total_bytes_read += n as u64;
            }
        }
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Async Calculated SHA256 of {}: {} ({} bytes read)",
        path.display(),
        actual,
        total_bytes_read
    );
    Ok(actual)
}

/// Compares two hex digests case-insensitively, touching every byte
/// regardless of where the first difference is.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    let a = expected.trim().as_bytes();
    let b = actual.trim().as_bytes();
    let len = a.len().max(b.len());
    let mut diff = u8::from(a.len() != b.len());
    for i in 0..len {
        let x = a.get(i).map_or(0, u8::to_ascii_lowercase);
        let y = b.get(i).map_or(0, u8::to_ascii_lowercase);
        diff |= x ^ y;
    }
    diff == 0
}

/// Hashes `path` and fails with `DigestMismatch` unless it matches `expected`.
pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<()> {
    debug!("Async Verifying checksum for: {}", path.display());
    let actual = sha256_file_async(path).await?;
    debug!("Expected SHA256:   {}", expected);
    if digests_match(expected, &actual) {
        Ok(())
    } else {
        Err(SprigError::DigestMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        })
    }
}
