//! Checksum strings attached to vendor descriptors.
//!
//! Checksums are algorithm-agnostic on the wire: `sha256:<hex>`,
//! `sha512:<hex>`, `blake3:<hex>`, or bare hex whose length implies the
//! algorithm.

use thiserror::Error;

/// Hash algorithms the verifier can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256 (64 hex characters).
    Sha256,
    /// SHA-512 (128 hex characters).
    Sha512,
    /// BLAKE3 (64 hex characters, prefix required).
    Blake3,
}

impl HashAlgorithm {
    /// Number of hex characters in a digest of this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha512 => write!(f, "sha512"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Errors produced while parsing a checksum string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChecksumError {
    /// The `algo:` prefix names an algorithm we cannot compute.
    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The digest has the wrong length for its algorithm, or no algorithm
    /// could be inferred from a bare digest's length.
    #[error("Invalid checksum length: {len} hex characters in '{value}'")]
    InvalidLength {
        /// Hex characters found.
        len: usize,
        /// The original checksum string.
        value: String,
    },

    /// The digest contains characters outside `[0-9a-fA-F]`.
    #[error("Checksum contains non-hex characters: '{0}'")]
    NotHex(String),
}

/// A parsed expected checksum. The digest is stored lowercase so comparisons
/// are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    digest: String,
}

impl Checksum {
    /// Parse a checksum string.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError`] if the prefix is unknown, the digest is not
    /// hex, or its length does not fit the algorithm.
    pub fn parse(value: &str) -> Result<Self, ChecksumError> {
        let trimmed = value.trim();
        let (algorithm, digest) = match trimmed.split_once(':') {
            Some((prefix, digest)) => {
                let algorithm = match prefix.to_ascii_lowercase().as_str() {
                    "sha256" => HashAlgorithm::Sha256,
                    "sha512" => HashAlgorithm::Sha512,
                    "blake3" => HashAlgorithm::Blake3,
                    other => return Err(ChecksumError::UnsupportedAlgorithm(other.to_string())),
                };
                (algorithm, digest)
            }
            None => {
                let algorithm = match trimmed.len() {
                    64 => HashAlgorithm::Sha256,
                    128 => HashAlgorithm::Sha512,
                    len => {
                        return Err(ChecksumError::InvalidLength {
                            len,
                            value: value.to_string(),
                        });
                    }
                };
                (algorithm, trimmed)
            }
        };

        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::NotHex(value.to_string()));
        }
        if digest.len() != algorithm.hex_len() {
            return Err(ChecksumError::InvalidLength {
                len: digest.len(),
                value: value.to_string(),
            });
        }

        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }

    /// Algorithm the digest was produced with.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.digest.eq_ignore_ascii_case(actual_hex)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn bare_64_hex_is_sha256() {
        let c = Checksum::parse(SHA256_HELLO).unwrap();
        assert_eq!(c.algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn prefix_selects_algorithm() {
        let c = Checksum::parse(&format!("blake3:{SHA256_HELLO}")).unwrap();
        assert_eq!(c.algorithm(), HashAlgorithm::Blake3);
        assert_eq!(c.to_string(), format!("blake3:{SHA256_HELLO}"));
    }

    #[test]
    fn comparison_ignores_case() {
        let c = Checksum::parse(&SHA256_HELLO.to_uppercase()).unwrap();
        assert_eq!(c.digest(), SHA256_HELLO);
        assert!(c.matches(&SHA256_HELLO.to_uppercase()));
    }

    #[test]
    fn rejects_unknown_prefix_and_bad_lengths() {
        assert_eq!(
            Checksum::parse("md5:abcd"),
            Err(ChecksumError::UnsupportedAlgorithm("md5".to_string()))
        );
        assert!(matches!(
            Checksum::parse("abc123"),
            Err(ChecksumError::InvalidLength { len: 6, .. })
        ));
        assert!(matches!(
            Checksum::parse(&format!("sha512:{SHA256_HELLO}")),
            Err(ChecksumError::InvalidLength { len: 64, .. })
        ));
        assert!(matches!(
            Checksum::parse(&"z".repeat(64)),
            Err(ChecksumError::NotHex(_))
        ));
    }
}
