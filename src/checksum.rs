//! Checksum computation and verification for lookaside artifacts
//!
//! The lookaside cache addresses files by hash, historically md5 and sha512.
//! Digests are computed in-process; a verification failure deletes the
//! offending local file so a corrupt artifact is never left on disk.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha512};
use tracing::warn;

/// Hash algorithms accepted in a sources manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    Md5,
    Sha512,
}

impl HashType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Md5 => "md5",
            HashType::Sha512 => "sha512",
        }
    }
}

impl FromStr for HashType {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(HashType::Md5),
            "sha512" => Ok(HashType::Sha512),
            other => Err(ChecksumError::UnsupportedHash(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checksum errors
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("Unsupported hash type: {0}")]
    UnsupportedHash(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file did not match its recorded hash; the local copy has been
    /// removed and the fetch is not retried automatically.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Compute the hex digest of a file, streaming in 64 KiB chunks
pub fn digest_file(path: &Path, hashtype: HashType) -> Result<String, ChecksumError> {
    match hashtype {
        HashType::Md5 => digest_with::<Md5>(path),
        HashType::Sha512 => digest_with::<Sha512>(path),
    }
}

fn digest_with<D: Digest>(path: &Path) -> Result<String, ChecksumError> {
    let mut file = File::open(path).map_err(|source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against its recorded hash, deleting the file on mismatch
pub fn verify_or_remove(
    path: &Path,
    hashtype: HashType,
    expected: &str,
) -> Result<(), ChecksumError> {
    let actual = digest_file(path, hashtype)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        return Ok(());
    }

    warn!(path = %path.display(), "checksum mismatch, deleting faulty file");
    if let Err(source) = std::fs::remove_file(path) {
        // Deletion failure is secondary; the mismatch is what the caller acts on.
        warn!(path = %path.display(), error = %source, "could not remove corrupt file");
    }

    Err(ChecksumError::Mismatch {
        path: path.to_path_buf(),
        expected: expected.trim().to_string(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_hashtype_parse() {
        assert_eq!("md5".parse::<HashType>().unwrap(), HashType::Md5);
        assert_eq!("SHA512".parse::<HashType>().unwrap(), HashType::Sha512);
        assert!("sha1".parse::<HashType>().is_err());
    }

    #[test]
    fn test_digest_file_sha512() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        let digest = digest_file(&path, HashType::Sha512).unwrap();
        assert_eq!(
            digest,
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_digest_file_md5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        let digest = digest_file(&path, HashType::Md5).unwrap();
        assert_eq!(digest, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_verify_match_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        verify_or_remove(&path, HashType::Md5, "900150983cd24fb0d6963f7d28e17f72").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_verify_mismatch_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        let err = verify_or_remove(&path, HashType::Md5, "0".repeat(32).as_str()).unwrap_err();
        assert!(matches!(err, ChecksumError::Mismatch { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"abc").unwrap();

        verify_or_remove(&path, HashType::Md5, "900150983CD24FB0D6963F7D28E17F72").unwrap();
        assert!(path.exists());
    }
}
