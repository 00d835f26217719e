//! Opt-in integrity verification of downloaded blobs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use naner_schema::{Checksum, ChecksumError, HashAlgorithm};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid checksum: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// What verification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No checksum configured.
    Skipped,
    /// The file matched the expected digest.
    Matched(HashAlgorithm),
}

/// Compute the hex digest of a file with an 8 KiB read buffer.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 8192];

    macro_rules! digest_with {
        ($hasher:expr) => {{
            let mut hasher = $hasher;
            loop {
                let count = file.read(&mut buffer)?;
                if count == 0 {
                    break;
                }
                hasher.update(&buffer[..count]);
            }
            hasher
        }};
    }

    Ok(match algorithm {
        HashAlgorithm::Sha256 => hex::encode(digest_with!(Sha256::new()).finalize()),
        HashAlgorithm::Sha512 => hex::encode(digest_with!(Sha512::new()).finalize()),
        HashAlgorithm::Blake3 => digest_with!(blake3::Hasher::new())
            .finalize()
            .to_hex()
            .to_string(),
    })
}

/// Verify `path` against `expected`. An absent checksum trivially succeeds.
///
/// # Errors
///
/// Returns [`VerifyError::Mismatch`] when the digests differ; this is a hard
/// failure for the vendor.
pub fn verify(path: &Path, expected: Option<&str>) -> Result<Verification, VerifyError> {
    let Some(expected) = expected else {
        return Ok(Verification::Skipped);
    };
    let checksum = Checksum::parse(expected)?;
    let actual = hash_file(path, checksum.algorithm())?;

    if checksum.matches(&actual) {
        Ok(Verification::Matched(checksum.algorithm()))
    } else {
        Err(VerifyError::Mismatch {
            expected: checksum.digest().to_string(),
            actual,
        })
    }
}

/// [`verify`] on a blocking thread.
///
/// # Errors
///
/// See [`verify`].
pub async fn verify_async(
    path: PathBuf,
    expected: Option<String>,
) -> Result<Verification, VerifyError> {
    tokio::task::spawn_blocking(move || verify(&path, expected.as_deref()))
        .await
        .map_err(std::io::Error::other)?
}
