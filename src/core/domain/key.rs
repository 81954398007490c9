//! Key records and the identifiers that name them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::validation;
use crate::error::{Error, Result, ValidationError};

/// A key fingerprint, normalized to uppercase hex without spaces.
///
/// Accepts 40 hex digits (v4 keys) or 64 hex digits (v5/v6 keys), with an
/// optional `0x` prefix and embedded whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse and normalize a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFingerprint` if the input is not 40 or
    /// 64 hex digits after normalization.
    pub fn parse(input: &str) -> Result<Self> {
        let hex = normalize_hex(input);

        if (hex.len() == 40 || hex.len() == 64) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(hex))
        } else {
            Err(ValidationError::InvalidFingerprint(input.to_string()).into())
        }
    }

    /// Fingerprint as uppercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 16 hex digit key ID derived from this fingerprint.
    ///
    /// v4 key IDs are the fingerprint suffix; v5/v6 key IDs are its prefix.
    pub fn key_id(&self) -> &str {
        if self.0.len() == 40 {
            &self.0[24..]
        } else {
            &self.0[..16]
        }
    }
}

/// Strip whitespace and a `0x` prefix, uppercase the rest.
fn normalize_hex(input: &str) -> String {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let stripped = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    stripped.to_ascii_uppercase()
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// One user ID attached to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId {
    pub name: String,
    pub email: Option<String>,
}

impl UserId {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Some(email.into()),
        }
    }

    /// Parse the conventional `Name (comment) <email>` form.
    ///
    /// Anything that does not end in a bracketed address is kept whole as
    /// the name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(open) = raw.rfind('<') {
            if raw.ends_with('>') {
                let email = raw[open + 1..raw.len() - 1].trim();
                return Self {
                    name: raw[..open].trim().to_string(),
                    email: (!email.is_empty()).then(|| email.to_string()),
                };
            }
        }
        Self {
            name: raw.to_string(),
            email: None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) if self.name.is_empty() => write!(f, "<{}>", email),
            Some(email) => write!(f, "{} <{}>", self.name, email),
            None => f.write_str(&self.name),
        }
    }
}

/// Public key algorithm, by OpenPGP algorithm number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Rsa,
    Elgamal,
    Dsa,
    Ecdh,
    Ecdsa,
    Eddsa,
    Other(u8),
}

impl Algorithm {
    pub fn from_code(code: u8) -> Self {
        match code {
            1..=3 => Algorithm::Rsa,
            16 | 20 => Algorithm::Elgamal,
            17 => Algorithm::Dsa,
            18 => Algorithm::Ecdh,
            19 => Algorithm::Ecdsa,
            22 => Algorithm::Eddsa,
            other => Algorithm::Other(other),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Rsa => f.write_str("RSA"),
            Algorithm::Elgamal => f.write_str("ElGamal"),
            Algorithm::Dsa => f.write_str("DSA"),
            Algorithm::Ecdh => f.write_str("ECDH"),
            Algorithm::Ecdsa => f.write_str("ECDSA"),
            Algorithm::Eddsa => f.write_str("EdDSA"),
            Algorithm::Other(code) => write!(f, "algo-{}", code),
        }
    }
}

/// Calculated validity of a key as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Unknown,
    Invalid,
    Disabled,
    Revoked,
    Expired,
    Undefined,
    Never,
    Marginal,
    Full,
    Ultimate,
}

impl Validity {
    /// Map a colon-listing validity letter.
    pub fn from_flag(flag: &str) -> Self {
        match flag {
            "i" => Validity::Invalid,
            "d" => Validity::Disabled,
            "r" => Validity::Revoked,
            "e" => Validity::Expired,
            "q" => Validity::Undefined,
            "n" => Validity::Never,
            "m" => Validity::Marginal,
            "f" => Validity::Full,
            "u" => Validity::Ultimate,
            _ => Validity::Unknown,
        }
    }

    /// Whether the engine will refuse to use this key at all.
    pub fn is_unusable(self) -> bool {
        matches!(
            self,
            Validity::Invalid | Validity::Disabled | Validity::Revoked | Validity::Expired
        )
    }
}

/// What a key as a whole can be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub encrypt: bool,
    pub sign: bool,
    pub certify: bool,
    pub authenticate: bool,
}

impl Capabilities {
    /// Parse the capability field of a primary key record.
    ///
    /// Uppercase letters describe the key including its subkeys.
    pub fn from_flags(flags: &str) -> Self {
        Self {
            encrypt: flags.contains('E'),
            sign: flags.contains('S'),
            certify: flags.contains('C'),
            authenticate: flags.contains('A'),
        }
    }

    pub fn all() -> Self {
        Self {
            encrypt: true,
            sign: true,
            certify: true,
            authenticate: false,
        }
    }
}

/// One keyring entry.
///
/// Engines build records from what the keyring reports, using the `with_*`
/// builders. The fingerprint has no builder and the key ID is always derived
/// from it by [`KeyRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    fingerprint: Fingerprint,
    key_id: String,
    user_ids: Vec<UserId>,
    algorithm: Algorithm,
    key_length_bits: u32,
    creation_time: DateTime<Utc>,
    expiration_time: Option<DateTime<Utc>>,
    has_private_component: bool,
    validity: Validity,
    capabilities: Capabilities,
}

impl KeyRecord {
    /// Create a record with no user IDs, no expiry and no private half.
    pub fn new(
        fingerprint: Fingerprint,
        algorithm: Algorithm,
        key_length_bits: u32,
        creation_time: DateTime<Utc>,
    ) -> Self {
        let key_id = fingerprint.key_id().to_string();
        Self {
            fingerprint,
            key_id,
            user_ids: Vec::new(),
            algorithm,
            key_length_bits,
            creation_time,
            expiration_time: None,
            has_private_component: false,
            validity: Validity::Unknown,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_user_id(mut self, uid: UserId) -> Self {
        self.user_ids.push(uid);
        self
    }

    pub fn with_expiration(mut self, expires: Option<DateTime<Utc>>) -> Self {
        self.expiration_time = expires;
        self
    }

    pub fn with_private_component(mut self, present: bool) -> Self {
        self.has_private_component = present;
        self
    }

    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// First user ID, which the engine lists as primary.
    pub fn primary_user_id(&self) -> Option<&UserId> {
        self.user_ids.first()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key_length_bits(&self) -> u32 {
        self.key_length_bits
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }

    /// Whether this key can decrypt and sign.
    pub fn has_private_component(&self) -> bool {
        self.has_private_component
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether the key is past its expiration time.
    pub fn is_expired(&self) -> bool {
        self.validity == Validity::Expired
            || self.expiration_time.is_some_and(|exp| exp <= Utc::now())
    }

    /// Whether data can be encrypted to this key right now.
    pub fn can_encrypt(&self) -> bool {
        self.capabilities.encrypt && !self.validity.is_unusable() && !self.is_expired()
    }

    /// Match a fingerprint or 16 hex digit key ID, case-insensitively.
    pub fn matches(&self, query: &str) -> bool {
        let query = normalize_hex(query);
        query == self.fingerprint.as_str() || query == self.key_id
    }
}

/// Parameters for a new key pair.
///
/// Only constructible through [`KeyParams::new`], so every instance has
/// already passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParams {
    name: String,
    email: String,
    length_bits: u32,
    expires_in_days: Option<u32>,
}

impl KeyParams {
    /// Validate and build key generation parameters.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty/ill-formed name, an email that
    /// is not `local@domain`, or a length outside 2048/3072/4096.
    pub fn new(name: &str, email: &str, length_bits: u32) -> Result<Self> {
        validation::validate_name(name)?;
        validation::validate_email(email)?;
        validation::validate_key_length(length_bits)?;

        Ok(Self {
            name: name.trim().to_string(),
            email: email.to_string(),
            length_bits,
            expires_in_days: None,
        })
    }

    /// Expire the key after `days` days. Zero means never.
    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expires_in_days = (days > 0).then_some(days);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn length_bits(&self) -> u32 {
        self.length_bits
    }

    pub fn expires_in_days(&self) -> Option<u32> {
        self.expires_in_days
    }
}

/// Result of a syntactic key block check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyFormat {
    WellFormed { fingerprints: Vec<Fingerprint> },
    Malformed { reason: String },
}

impl KeyFormat {
    pub fn is_well_formed(&self) -> bool {
        matches!(self, KeyFormat::WellFormed { .. })
    }
}
