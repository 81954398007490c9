//! Key lifecycle.
//!
//! [`KeyService`] validates requests, serializes keyring mutations, and turns
//! engine results into [`KeyRecord`]s. Mutations (generate, import, delete)
//! hold the keyring lock exclusively; reads (list, info, export, validate)
//! share it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::domain::{Fingerprint, KeyFormat, KeyParams, KeyRecord, Passphrase};
use crate::core::engine::Engine;
use crate::error::{EngineError, KeyError, Result, ValidationError};

/// Key management over one keyring.
#[derive(Clone)]
pub struct KeyService {
    engine: Arc<dyn Engine>,
    lock: Arc<RwLock<()>>,
}

impl KeyService {
    /// Create a service sharing `lock` with every other user of the keyring.
    pub fn new(engine: Arc<dyn Engine>, lock: Arc<RwLock<()>>) -> Self {
        Self { engine, lock }
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Generate a key pair with no expiry.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` for a bad name, email or length, before the engine
    /// is involved; `EngineUnavailable` or `EngineTimeout` from the engine.
    pub fn generate_key_pair(
        &self,
        name: &str,
        email: &str,
        length_bits: u32,
        passphrase: Option<Passphrase>,
    ) -> Result<KeyRecord> {
        let params = KeyParams::new(name, email, length_bits)?;
        self.generate(&params, passphrase)
    }

    /// Generate a key pair from prepared parameters.
    pub fn generate(&self, params: &KeyParams, passphrase: Option<Passphrase>) -> Result<KeyRecord> {
        let record = {
            let _guard = self.write();
            self.engine.generate_key(params, passphrase.as_ref())?
        };
        drop(passphrase);

        if !record.has_private_component() {
            return Err(EngineError::UnexpectedOutput("generate").into());
        }
        Ok(record)
    }

    /// Import one or more keys.
    ///
    /// Importing a key that is already present is a no-op for that key and
    /// still returns its record.
    ///
    /// # Errors
    ///
    /// `MalformedKeyData` if the data is not a complete key block; nothing is
    /// imported in that case.
    pub fn import_key(&self, data: &[u8]) -> Result<Vec<KeyRecord>> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::EmptyKeyData.into());
        }

        let _guard = self.write();
        let records = self.engine.import_key(data)?;
        info!(keys = records.len(), "import complete");
        Ok(records)
    }

    /// Export a key by fingerprint or key ID.
    ///
    /// Exporting the private half is sensitive; the caller is expected to
    /// have authorized it.
    ///
    /// # Errors
    ///
    /// `KeyNotFound`, or `PrivateKeyUnavailable` when `include_private` is set
    /// for a public-only key.
    pub fn export_key(
        &self,
        query: &str,
        include_private: bool,
        passphrase: Option<Passphrase>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        check_query(query)?;

        let _guard = self.read();
        let record = self.lookup(query)?;
        if include_private && !record.has_private_component() {
            return Err(KeyError::PrivateKeyUnavailable(record.fingerprint().to_string()).into());
        }

        if include_private {
            info!(fingerprint = %record.fingerprint(), "exporting private key");
        }
        self.engine
            .export_key(record.fingerprint(), include_private, passphrase.as_ref())
    }

    /// List keys, optionally only those with a private half.
    pub fn list_keys(&self, private_only: bool) -> Result<Vec<KeyRecord>> {
        let _guard = self.read();
        let keys = self.engine.list_keys(private_only)?;
        debug!(count = keys.len(), private_only, "listed keys");
        Ok(keys)
    }

    /// Look up one key by fingerprint or 16 digit key ID.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` if the query is not a fingerprint or key ID,
    /// `KeyNotFound` if nothing matches.
    pub fn get_key_info(&self, query: &str) -> Result<KeyRecord> {
        check_query(query)?;

        let _guard = self.read();
        self.lookup(query)
    }

    /// Delete a key and its private half, if any.
    ///
    /// Only a full fingerprint is accepted, since deletion is irreversible.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if the key is not present.
    pub fn delete_key(&self, fingerprint: &str) -> Result<()> {
        let fingerprint = Fingerprint::parse(fingerprint)?;

        let _guard = self.write();
        self.engine.delete_key(&fingerprint)
    }

    /// Syntactic check of key data. Never changes the keyring.
    pub fn validate_key_format(&self, data: &[u8]) -> Result<KeyFormat> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(KeyFormat::Malformed {
                reason: "no key data".to_string(),
            });
        }

        let _guard = self.read();
        self.engine.validate_key_format(data)
    }

    /// Caller must hold the lock.
    fn lookup(&self, query: &str) -> Result<KeyRecord> {
        self.engine
            .list_keys(false)?
            .into_iter()
            .find(|record| record.matches(query))
            .ok_or_else(|| KeyError::NotFound(query.trim().to_string()).into())
    }
}

/// A query is a 40/64 digit fingerprint or a 16 digit key ID.
fn check_query(query: &str) -> Result<()> {
    let hex: String = query
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(&hex);

    if matches!(hex.len(), 16 | 40 | 64) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFingerprint(query.to_string()).into())
    }
}
