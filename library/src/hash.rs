// This file's job is to compute and compare content digests of local files.
// Downloads can be hundreds of megabytes (sample libraries), so hashing
// always streams; nothing here loads a whole file into memory.

use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Why a file could not be verified. `Unreadable` is distinct from a digest
/// mismatch so callers can tell "missing file" apart from "corrupt download".
#[derive(Debug)]
pub enum HashError {
    Unreadable(std::io::Error),
    /// The expected digest string was not valid hex.
    InvalidExpectedDigest(String),
}

impl std::error::Error for HashError {}

impl Display for HashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HashError::Unreadable(e) => write!(f, "File could not be read: {e}"),
            HashError::InvalidExpectedDigest(s) => {
                write!(f, "Expected digest is not valid hex: {s}")
            }
        }
    }
}

/// Streams `reader` through sha256 and returns the lowercase hex digest.
pub fn compute_digest<R: Read>(reader: &mut R) -> std::io::Result<String> {
    // Based on guidance from:
    // https://github.com/RustCrypto/hashes#hashing-readable-objects
    let mut hasher = Sha256::new();
    std::io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the digest of the file at `path`.
pub fn file_digest(path: &Path) -> Result<String, HashError> {
    let mut file = fs::File::open(path).map_err(HashError::Unreadable)?;
    compute_digest(&mut file).map_err(HashError::Unreadable)
}

/// Verifies the file at `path` against `expected` (hex, case-insensitive).
/// Returns Ok(false) on mismatch; Err only if the file cannot be read or the
/// expectation is malformed.
pub fn verify_file(path: &Path, expected: &str) -> Result<bool, HashError> {
    let expected_bytes = hex::decode(expected)
        .map_err(|_| HashError::InvalidExpectedDigest(expected.to_string()))?;
    let actual = file_digest(path)?;
    // file_digest returns lowercase hex, so decoding both sides makes the
    // comparison case-insensitive.
    let matches = hex::decode(&actual).unwrap_or_default() == expected_bytes;
    if !matches {
        soundloom_warn!(
            "Hash mismatch: {:?}, expected: {}, got: {}",
            path,
            expected,
            actual
        );
    }
    Ok(matches)
}
