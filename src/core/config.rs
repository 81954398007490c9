//! Configuration file management.
//!
//! Handles reading and validating `config.toml`. The configuration is loaded
//! once at startup; nothing in the services re-reads or swaps it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::constants;
use crate::error::{ConfigError, Result};

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub keyring: KeyringConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

/// Where the durable keyring lives and which engine drives it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeyringConfig {
    /// Keyring directory (the engine's home directory)
    pub dir: PathBuf,
    /// Engine binary name or path
    pub engine: String,
}

/// Limits applied to every engine call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on every call except key generation
    pub timeout_secs: u64,
    /// Bound on key generation
    pub keygen_timeout_secs: u64,
    /// Cipher jobs allowed to run at once
    pub max_concurrent_jobs: usize,
    /// ASCII-armor encrypted files and exported keys
    pub armor: bool,
}

/// Ephemeral file staging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagingConfig {
    pub dir: PathBuf,
    /// Largest accepted upload
    pub max_payload_bytes: u64,
    /// Staged files older than this are swept as orphans
    pub retention_secs: u64,
    /// Accepted upload extensions; empty accepts all
    pub allowed_extensions: Vec<String>,
}

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::APP_DIR)
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            dir: app_dir().join(constants::KEYRING_DIR),
            engine: constants::DEFAULT_ENGINE.to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
            keygen_timeout_secs: constants::DEFAULT_KEYGEN_TIMEOUT_SECS,
            max_concurrent_jobs: constants::DEFAULT_MAX_JOBS,
            armor: true,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: app_dir().join(constants::STAGING_DIR),
            max_payload_bytes: constants::DEFAULT_MAX_PAYLOAD_BYTES,
            retention_secs: constants::DEFAULT_RETENTION_SECS,
            allowed_extensions: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keyring: KeyringConfig::default(),
            engine: EngineConfig::default(),
            staging: StagingConfig::default(),
        }
    }
}

impl Config {
    /// Config rooted at an arbitrary base directory.
    ///
    /// Keyring and staging directories live underneath `base`. Used by tests
    /// and by anyone embedding the service without a config file.
    pub fn with_base_dir(base: &Path) -> Self {
        let mut config = Self::default();
        config.keyring.dir = base.join(constants::KEYRING_DIR);
        config.staging.dir = base.join(constants::STAGING_DIR);
        config
    }

    /// Default config file path (`~/.keysmith/config.toml`).
    pub fn default_path() -> PathBuf {
        app_dir().join(constants::CONFIG_FILE)
    }

    /// Resolve which config file to read, if any.
    ///
    /// An explicit path wins, then `$KEYSMITH_CONFIG`, then the default path
    /// if it exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(constants::CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let default = Self::default_path();
        default.exists().then_some(default)
    }

    /// Load configuration, falling back to defaults when no file is found.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a located file cannot be read or parsed, or
    /// fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.keyring.dir = expand_home(&config.keyring.dir);
        config.staging.dir = expand_home(&config.staging.dir);
        for ext in &mut config.staging.allowed_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }

        config.validate()?;

        debug!(
            keyring = %config.keyring.dir.display(),
            staging = %config.staging.dir.display(),
            "config loaded"
        );

        Ok(config)
    }

    /// Render configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::Serialize)?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for zero limits or an empty engine name.
    pub fn validate(&self) -> Result<()> {
        if self.keyring.engine.trim().is_empty() {
            return Err(ConfigError::Invalid("keyring.engine cannot be empty".into()).into());
        }
        if self.engine.timeout_secs == 0 || self.engine.keygen_timeout_secs == 0 {
            return Err(ConfigError::Invalid("engine timeouts must be positive".into()).into());
        }
        if self.engine.max_concurrent_jobs == 0 {
            return Err(
                ConfigError::Invalid("engine.max_concurrent_jobs must be at least 1".into()).into(),
            );
        }
        if self.staging.max_payload_bytes == 0 {
            return Err(
                ConfigError::Invalid("staging.max_payload_bytes must be positive".into()).into(),
            );
        }
        if self.keyring.dir == self.staging.dir {
            return Err(ConfigError::Invalid(
                "keyring and staging directories must differ".into(),
            )
            .into());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.engine.timeout_secs)
    }

    pub fn keygen_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.keygen_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.staging.retention_secs)
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
