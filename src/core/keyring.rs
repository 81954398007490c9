//! Keyring directory ownership.
//!
//! The keyring is the engine's home directory and the only durable state the
//! service manages. Its contents are only ever touched through the engine;
//! this module just makes sure the directory exists with the right
//! permissions and agent policy.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::constants;
use crate::error::{KeyringError, Result};

/// Agent configuration file name inside the keyring.
const AGENT_CONF_FILE: &str = "gpg-agent.conf";

/// Handle to an initialized keyring directory.
#[derive(Debug, Clone)]
pub struct Keyring {
    dir: PathBuf,
}

impl Keyring {
    /// Open (creating if needed) the keyring directory.
    ///
    /// Creates the directory with 0700 permissions on Unix and writes an agent
    /// configuration that disables passphrase caching, unless one already
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or agent configuration cannot be
    /// created.
    pub fn open(dir: &Path) -> Result<Self> {
        debug!(path = %dir.display(), "opening keyring");

        let prepare = |source: std::io::Error| KeyringError::Prepare {
            path: dir.display().to_string(),
            source,
        };
        fs::create_dir_all(dir).map_err(prepare)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Some(mode) = crate::core::validation::check_permissions(dir, 0o700)? {
                warn!(
                    path = %dir.display(),
                    mode = %format!("{:o}", mode),
                    "tightening keyring permissions"
                );
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(prepare)?;
            }
        }

        let agent_conf = dir.join(AGENT_CONF_FILE);
        if !agent_conf.exists() {
            fs::write(&agent_conf, constants::AGENT_CONF).map_err(prepare)?;
            debug!(path = %agent_conf.display(), "wrote agent configuration");
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Keyring directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory is still present and writable.
    pub fn is_writable(&self) -> bool {
        fs::metadata(&self.dir)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }
}
