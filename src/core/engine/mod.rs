//! Cryptographic engine client.
//!
//! The engine owns every cryptographic primitive and the on-disk keyring
//! format. This module defines the narrow surface the services depend on and
//! the GnuPG implementation of it.
//!
//! ## Contract
//!
//! - Every call is blocking and bounded by a timeout.
//! - Errors are already mapped onto the crate taxonomy; no engine output text
//!   crosses this boundary.
//! - Implementations must be safe to call from several threads at once. The
//!   services, not the engine, serialize keyring mutations.
//!
//! ## Adding a New Engine
//!
//! 1. Implement the `Engine` trait
//! 2. Add the implementation in a new file next to `gpg.rs`
//! 3. Re-export from this module

use std::path::Path;

use zeroize::Zeroizing;

use crate::core::domain::{Fingerprint, KeyFormat, KeyParams, KeyRecord, Passphrase, Verification};
use crate::error::Result;

mod colons;
mod gpg;
mod process;
mod status;

pub use gpg::GnuPg;

/// OpenPGP engine operations.
pub trait Engine: Send + Sync {
    /// Engine name for display and health reports.
    fn name(&self) -> &'static str;

    /// Check the engine answers, returning its version string.
    ///
    /// # Errors
    ///
    /// `EngineUnavailable` if it cannot be started, `EngineTimeout` if it
    /// does not answer in time.
    fn probe(&self) -> Result<String>;

    /// Generate a new key pair and return its record.
    ///
    /// # Errors
    ///
    /// `EngineTimeout` when generation outlasts the key generation bound.
    fn generate_key(&self, params: &KeyParams, passphrase: Option<&Passphrase>)
        -> Result<KeyRecord>;

    /// Import one or more keys from armored or binary data.
    ///
    /// Returns the records of every key contained in the data, including keys
    /// that were already present.
    ///
    /// # Errors
    ///
    /// `MalformedKeyData` if the data does not parse as a key block; the
    /// keyring is left untouched in that case.
    fn import_key(&self, data: &[u8]) -> Result<Vec<KeyRecord>>;

    /// Export a key, optionally including its private half.
    ///
    /// # Errors
    ///
    /// `KeyNotFound`, or `PrivateKeyUnavailable` when the private half is
    /// requested but absent.
    fn export_key(
        &self,
        fingerprint: &Fingerprint,
        include_private: bool,
        passphrase: Option<&Passphrase>,
    ) -> Result<Zeroizing<Vec<u8>>>;

    /// List keys. With `private_only`, only keys holding a private half.
    fn list_keys(&self, private_only: bool) -> Result<Vec<KeyRecord>>;

    /// Delete a key and, if present, its private half.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if no such key exists.
    fn delete_key(&self, fingerprint: &Fingerprint) -> Result<()>;

    /// Encrypt `input` into `output` for exactly the given recipients.
    ///
    /// # Errors
    ///
    /// `EncryptionFailed` if the engine refuses; no output is produced for a
    /// subset of recipients.
    fn encrypt(&self, input: &Path, output: &Path, recipients: &[Fingerprint]) -> Result<()>;

    /// Decrypt `input` into `output`.
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` with a coarse reason.
    fn decrypt(&self, input: &Path, output: &Path, passphrase: Option<&Passphrase>)
        -> Result<()>;

    /// Verify a signature. With `signature` set, `data` is checked against a
    /// detached signature; otherwise `data` must carry its own signature.
    fn verify(&self, data: &Path, signature: Option<&Path>) -> Result<Verification>;

    /// Syntactic check of a key block. Never mutates the keyring.
    fn validate_key_format(&self, data: &[u8]) -> Result<KeyFormat>;
}

/// Quick structural sniff of key material, before involving the engine.
///
/// Armored data must carry a PGP armor header and footer; binary data must
/// start with an OpenPGP packet tag byte.
pub fn sniff_key_data(data: &[u8]) -> std::result::Result<(), &'static str> {
    use crate::core::constants::{ARMOR_BEGIN, ARMOR_END};

    let trimmed = trim_ascii_start(data);
    if trimmed.is_empty() {
        return Err("no key data");
    }

    if trimmed.starts_with(b"-----") {
        let text = String::from_utf8_lossy(trimmed);
        if !text.starts_with(ARMOR_BEGIN) || !text.contains(ARMOR_END) {
            return Err("missing PGP armor header or footer");
        }
        if !text.contains("KEY BLOCK") {
            return Err("armored data is not a key block");
        }
        return Ok(());
    }

    if trimmed[0] & 0x80 == 0 {
        return Err("not armored and not an OpenPGP packet");
    }
    Ok(())
}

fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}
