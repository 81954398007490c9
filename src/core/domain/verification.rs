//! Signature verification outcome.

use serde::Serialize;

use super::Fingerprint;

/// What the engine concluded about a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// Good signature from a key in the keyring.
    Valid { fingerprint: Fingerprint },
    /// Signature does not match the data.
    Bad { key_id: String },
    /// Signed by a key the keyring does not hold.
    UnknownSigner { key_id: String },
    /// No signature could be found in the input.
    Malformed,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }
}
