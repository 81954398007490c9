//! Error types.
//!
//! Every failure maps onto a small, stable taxonomy ([`ErrorKind`]) so the
//! request layer can decide how to report it without inspecting messages.
//! Nothing in here ever carries passphrases, key material, plaintext, or raw
//! engine output.

use std::fmt;

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reaching or driving the external engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine timed out after {seconds}s during {operation}")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("engine failed during {operation} (exit {code})")]
    Failed { operation: &'static str, code: i32 },

    #[error("unexpected engine output during {0}")]
    UnexpectedOutput(&'static str),
}

/// Keyring lookups and key material problems.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("malformed key data: {0}")]
    Malformed(String),

    #[error("no private key available for {0}")]
    PrivateKeyUnavailable(String),
}

/// Encryption, decryption and verification outcomes.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("no recipients selected")]
    NoRecipients,

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("recipient cannot receive encrypted data: {0}")]
    UnusableRecipient(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: {0}")]
    DecryptionFailed(DecryptFailure),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },
}

/// Coarse reason attached to a failed decryption.
///
/// The engine's own wording is not stable, so only these buckets are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailure {
    NoSecretKey,
    BadPassphrase,
    CorruptInput,
    Unknown,
}

impl fmt::Display for DecryptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DecryptFailure::NoSecretKey => "no matching private key",
            DecryptFailure::BadPassphrase => "wrong or missing passphrase",
            DecryptFailure::CorruptInput => "input is not valid OpenPGP data",
            DecryptFailure::Unknown => "engine rejected the input",
        };
        f.write_str(text)
    }
}

/// Caller input that fails validation before any engine call.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unsupported key length {0} (allowed: 2048, 3072, 4096)")]
    UnsupportedKeyLength(u32),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(&'static str),

    #[error("key data cannot be empty")]
    EmptyKeyData,

    #[error("file type not allowed: {0}")]
    DisallowedExtension(String),
}

/// Configuration loading problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Keyring directory setup problems.
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("failed to prepare keyring directory {path}: {source}")]
    Prepare {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Staging area I/O problems.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("failed to prepare staging directory {path}: {source}")]
    Prepare {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write staged file: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to persist staged file to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stable classification of every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameters,
    KeyNotFound,
    UnknownRecipient,
    MalformedKeyData,
    PrivateKeyUnavailable,
    DecryptionFailed,
    EncryptionFailed,
    EngineUnavailable,
    EngineTimeout,
    PayloadTooLarge,
    Internal,
}

impl Error {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Engine(EngineError::Unavailable(_)) => ErrorKind::EngineUnavailable,
            Error::Engine(EngineError::Timeout { .. }) => ErrorKind::EngineTimeout,
            Error::Engine(_) => ErrorKind::Internal,
            Error::Key(KeyError::NotFound(_)) => ErrorKind::KeyNotFound,
            Error::Key(KeyError::Malformed(_)) => ErrorKind::MalformedKeyData,
            Error::Key(KeyError::PrivateKeyUnavailable(_)) => ErrorKind::PrivateKeyUnavailable,
            Error::Cipher(CipherError::NoRecipients) => ErrorKind::InvalidParameters,
            Error::Cipher(CipherError::UnknownRecipient(_)) => ErrorKind::UnknownRecipient,
            Error::Cipher(CipherError::UnusableRecipient(_)) => ErrorKind::InvalidParameters,
            Error::Cipher(CipherError::EncryptionFailed) => ErrorKind::EncryptionFailed,
            Error::Cipher(CipherError::DecryptionFailed(_)) => ErrorKind::DecryptionFailed,
            Error::Cipher(CipherError::PayloadTooLarge { .. }) => ErrorKind::PayloadTooLarge,
            Error::Validation(_) => ErrorKind::InvalidParameters,
            Error::Config(_)
            | Error::Keyring(_)
            | Error::Staging(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// The services themselves never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EngineUnavailable | ErrorKind::EngineTimeout
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
