//! Service wiring.
//!
//! [`Keysmith`] is built once at startup from a [`Config`]. It owns the
//! keyring lock and staging area shared by the key and cipher services, and
//! answers the liveness probe.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::core::cipher::CipherService;
use crate::core::config::Config;
use crate::core::domain::{Health, HealthStatus};
use crate::core::engine::{Engine, GnuPg};
use crate::core::keyring::Keyring;
use crate::core::keys::KeyService;
use crate::core::staging::StagingArea;
use crate::error::Result;

/// Entry point to the key and cipher services.
#[derive(Clone)]
pub struct Keysmith {
    engine: Arc<dyn Engine>,
    keyring: Keyring,
    staging: Arc<StagingArea>,
    keys: KeyService,
    cipher: CipherService,
}

impl Keysmith {
    /// Open the configured keyring and staging area with the GnuPG engine.
    ///
    /// Orphaned staged files from a previous run are swept here.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or either directory
    /// cannot be prepared. An unreachable engine is not an error; it shows up
    /// in [`Keysmith::health`] and on the first call.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let keyring = Keyring::open(&config.keyring.dir)?;
        let engine = GnuPg::new(config, &keyring);
        Self::with_engine(config, keyring, Arc::new(engine))
    }

    /// Wire the services around an existing engine.
    pub fn with_engine(config: &Config, keyring: Keyring, engine: Arc<dyn Engine>) -> Result<Self> {
        let staging = Arc::new(StagingArea::open(&config.staging.dir, config.retention())?);
        match staging.sweep() {
            Ok(0) => {}
            Ok(removed) => info!(removed, "removed orphaned staged files"),
            Err(e) => warn!(error = %e, "staging sweep failed"),
        }

        let lock = Arc::new(RwLock::new(()));
        let keys = KeyService::new(Arc::clone(&engine), Arc::clone(&lock));
        let cipher = CipherService::new(Arc::clone(&engine), lock, Arc::clone(&staging), config);

        debug!(engine = engine.name(), keyring = %keyring.dir().display(), "service ready");

        Ok(Self {
            engine,
            keyring,
            staging,
            keys,
            cipher,
        })
    }

    pub fn keys(&self) -> &KeyService {
        &self.keys
    }

    pub fn cipher(&self) -> &CipherService {
        &self.cipher
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Remove staged files older than the retention window.
    pub fn sweep_staging(&self) -> Result<usize> {
        self.staging.sweep()
    }

    /// Probe the engine and the directories it depends on.
    ///
    /// `Unavailable` if the engine does not answer, `Degraded` if it answers
    /// but the keyring or staging area is not writable.
    pub fn health(&self) -> Health {
        let name = self.engine.name();

        let version = match self.engine.probe() {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "engine probe failed");
                return Health {
                    status: HealthStatus::Unavailable,
                    engine: name,
                    engine_version: None,
                    detail: Some(e.to_string()),
                };
            }
        };

        let mut problems = Vec::new();
        if !self.keyring.is_writable() {
            problems.push("keyring is not writable");
        }
        if !self.staging.is_writable() {
            problems.push("staging area is not writable");
        }

        let (status, detail) = if problems.is_empty() {
            (HealthStatus::Healthy, None)
        } else {
            (HealthStatus::Degraded, Some(problems.join("; ")))
        };

        Health {
            status,
            engine: name,
            engine_version: Some(version),
            detail,
        }
    }
}
