//! Constants used throughout keysmith.
//!
//! Centralizes magic strings and default configuration values.

/// Application directory relative to HOME (~/.keysmith).
pub const APP_DIR: &str = ".keysmith";

/// Configuration file name inside the application directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "KEYSMITH_CONFIG";

/// Environment variable that may carry a passphrase for non-interactive use.
pub const PASSPHRASE_ENV: &str = "KEYSMITH_PASSPHRASE";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "KEYSMITH_LOG";

/// Keyring directory name inside the application directory.
pub const KEYRING_DIR: &str = "keyring";

/// Staging directory name inside the application directory.
pub const STAGING_DIR: &str = "staging";

/// Default engine binary.
pub const DEFAULT_ENGINE: &str = "gpg";

/// Fallback binary name some distributions install GnuPG 2 under.
pub const FALLBACK_ENGINE: &str = "gpg2";

/// Default bound on a single engine call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default bound on key generation, which may block on entropy.
pub const DEFAULT_KEYGEN_TIMEOUT_SECS: u64 = 300;

/// Default number of cipher jobs allowed to run at once.
pub const DEFAULT_MAX_JOBS: usize = 4;

/// Default maximum accepted upload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Staged files older than this are treated as orphans.
pub const DEFAULT_RETENTION_SECS: u64 = 3600;

/// Key lengths the service will generate.
pub const ALLOWED_KEY_LENGTHS: &[u32] = &[2048, 3072, 4096];

/// Default key length for generation.
pub const DEFAULT_KEY_LENGTH: u32 = 2048;

/// Agent configuration written into every keyring.
///
/// Disables passphrase caching so every decryption re-checks the passphrase.
pub const AGENT_CONF: &str = "default-cache-ttl 0\nmax-cache-ttl 0\nallow-loopback-pinentry\n";

/// Armor header prefix shared by all OpenPGP armored blocks.
pub const ARMOR_BEGIN: &str = "-----BEGIN PGP";

/// Armor footer prefix shared by all OpenPGP armored blocks.
pub const ARMOR_END: &str = "-----END PGP";
