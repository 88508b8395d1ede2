use ethereum_types::H256;
use sha2::{Digest, Sha256};

use super::ArtifactsError;

/// Verifies downloaded archive bytes before they are unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityChecker {
    /// Expects the SHA-256 of the archive to equal the given digest.
    Hash(H256),
    /// Accepts anything. Used for sources without a registry entry.
    Noop,
}

impl IntegrityChecker {
    pub fn check(&self, data: &[u8]) -> Result<(), ArtifactsError> {
        let IntegrityChecker::Hash(expected) = self else {
            return Ok(());
        };
        let actual = H256::from_slice(&Sha256::digest(data));
        if actual != *expected {
            return Err(ArtifactsError::IntegrityCheckFailed {
                expected: *expected,
                actual,
            });
        }
        Ok(())
    }
}
