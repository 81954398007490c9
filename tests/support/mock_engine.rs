//! In-memory engine for exercising the services without GnuPG.
//!
//! Keys live in a map; key blocks and ciphertext use a trivial line format
//! that only this engine understands. Every call is counted, and cipher and
//! mutation calls record how many ran at once.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use keysmith::core::domain::{
    Algorithm, Capabilities, Fingerprint, KeyFormat, KeyParams, KeyRecord, Passphrase, UserId,
    Validity, Verification,
};
use keysmith::core::engine::{sniff_key_data, Engine};
use keysmith::error::{CipherError, DecryptFailure, KeyError, Result};
use zeroize::Zeroizing;

/// Fingerprints are unique across every engine in the test process, so keys
/// moved between keyrings keep their identity and never collide by accident.
static NEXT_FINGERPRINT: AtomicU64 = AtomicU64::new(0xA11CE);

const BLOCK_BEGIN: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const BLOCK_END: &str = "-----END PGP PUBLIC KEY BLOCK-----";
const MESSAGE_MAGIC: &str = "MOCKMSG";
const SIGNATURE_MAGIC: &str = "MOCKSIG";

#[derive(Debug, Clone)]
struct MockKey {
    name: String,
    email: String,
    private: bool,
    encrypt: bool,
    expired: bool,
    passphrase: Option<String>,
    created: DateTime<Utc>,
    expires: Option<DateTime<Utc>>,
}

/// Scripted engine backed by a `BTreeMap`.
#[derive(Default)]
pub struct MockEngine {
    keys: Mutex<BTreeMap<Fingerprint, MockKey>>,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    cipher_running: AtomicUsize,
    cipher_peak: AtomicUsize,
    mutating: AtomicUsize,
    mutation_overlap: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mutation and cipher call sleep for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of engine calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most cipher calls observed running at once.
    pub fn cipher_peak(&self) -> usize {
        self.cipher_peak.load(Ordering::SeqCst)
    }

    /// Whether two keyring mutations ever overlapped.
    pub fn mutations_overlapped(&self) -> bool {
        self.mutation_overlap.load(Ordering::SeqCst)
    }

    pub fn key_count(&self) -> usize {
        self.keys().len()
    }

    /// Insert a key that cannot be used for encryption.
    pub fn add_unusable_key(&self, email: &str, expired: bool) -> Fingerprint {
        let fingerprint = next_fingerprint();
        self.keys().insert(
            fingerprint.clone(),
            MockKey {
                name: "Unusable".into(),
                email: email.into(),
                private: false,
                encrypt: expired,
                expired,
                passphrase: None,
                created: Utc::now(),
                expires: None,
            },
        );
        fingerprint
    }

    fn keys(&self) -> std::sync::MutexGuard<'_, BTreeMap<Fingerprint, MockKey>> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }

    fn mutation<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.mutating.fetch_add(1, Ordering::SeqCst) > 0 {
            self.mutation_overlap.store(true, Ordering::SeqCst);
        }
        self.pause();
        let result = f();
        self.mutating.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn cipher<T>(&self, f: impl FnOnce() -> T) -> T {
        let now = self.cipher_running.fetch_add(1, Ordering::SeqCst) + 1;
        self.cipher_peak.fetch_max(now, Ordering::SeqCst);
        self.pause();
        let result = f();
        self.cipher_running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn next_fingerprint() -> Fingerprint {
    let n = NEXT_FINGERPRINT.fetch_add(1, Ordering::SeqCst);
    Fingerprint::parse(&format!("{:040X}", n)).expect("counter renders as a fingerprint")
}

fn record(fingerprint: &Fingerprint, key: &MockKey) -> KeyRecord {
    let capabilities = Capabilities {
        encrypt: key.encrypt,
        ..Capabilities::all()
    };
    let expires = if key.expired {
        Some(key.created - ChronoDuration::days(1))
    } else {
        key.expires
    };

    KeyRecord::new(fingerprint.clone(), Algorithm::Rsa, 2048, key.created)
        .with_user_id(UserId::new(key.name.clone(), key.email.clone()))
        .with_private_component(key.private)
        .with_validity(if key.expired {
            Validity::Expired
        } else {
            Validity::Ultimate
        })
        .with_capabilities(capabilities)
        .with_expiration(expires)
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

fn render_block(fingerprint: &Fingerprint, key: &MockKey, private: bool) -> String {
    format!(
        "{}\nMOCK {} {} {} {} {} {} {}\n{}\n",
        BLOCK_BEGIN,
        fingerprint,
        flag(private),
        flag(key.encrypt),
        flag(key.expired),
        if private {
            key.passphrase.as_deref().unwrap_or("-")
        } else {
            "-"
        },
        key.email,
        key.name,
        BLOCK_END
    )
}

fn parse_blocks(data: &[u8]) -> std::result::Result<Vec<(Fingerprint, MockKey)>, String> {
    sniff_key_data(data).map_err(str::to_string)?;
    let text = std::str::from_utf8(data).map_err(|_| "not utf-8".to_string())?;

    let mut keys = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("-----") {
            continue;
        }
        let fields: Vec<&str> = line.splitn(8, ' ').collect();
        if fields.len() != 8 || fields[0] != "MOCK" {
            return Err("unrecognized packet".into());
        }
        let fingerprint = Fingerprint::parse(fields[1]).map_err(|_| "bad fingerprint".to_string())?;
        keys.push((
            fingerprint,
            MockKey {
                private: fields[2] == "1",
                encrypt: fields[3] == "1",
                expired: fields[4] == "1",
                passphrase: (fields[5] != "-").then(|| fields[5].to_string()),
                email: fields[6].to_string(),
                name: fields[7].to_string(),
                created: Utc::now(),
                expires: None,
            },
        ));
    }

    if keys.is_empty() {
        return Err("no keys found in data".into());
    }
    Ok(keys)
}

impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn probe(&self) -> Result<String> {
        self.count();
        Ok("mock 1.0".into())
    }

    fn generate_key(
        &self,
        params: &KeyParams,
        passphrase: Option<&Passphrase>,
    ) -> Result<KeyRecord> {
        self.count();
        self.mutation(|| -> Result<_> {
            let fingerprint = next_fingerprint();
            let created = Utc::now();
            let key = MockKey {
                name: params.name().to_string(),
                email: params.email().to_string(),
                private: true,
                encrypt: true,
                expired: false,
                passphrase: passphrase.map(|p| p.expose_secret().to_string()),
                created,
                expires: params
                    .expires_in_days()
                    .map(|days| created + ChronoDuration::days(i64::from(days))),
            };
            let rec = record(&fingerprint, &key);
            self.keys().insert(fingerprint, key);
            Ok(rec)
        })
    }

    fn import_key(&self, data: &[u8]) -> Result<Vec<KeyRecord>> {
        self.count();
        let parsed = parse_blocks(data).map_err(KeyError::Malformed)?;

        self.mutation(|| -> Result<_> {
            let mut keys = self.keys();
            let mut records = Vec::new();
            for (fingerprint, incoming) in parsed {
                let merged = match keys.get(&fingerprint) {
                    Some(existing) if existing.private && !incoming.private => existing.clone(),
                    _ => incoming,
                };
                records.push(record(&fingerprint, &merged));
                keys.insert(fingerprint, merged);
            }
            Ok(records)
        })
    }

    fn export_key(
        &self,
        fingerprint: &Fingerprint,
        include_private: bool,
        passphrase: Option<&Passphrase>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.count();
        let keys = self.keys();
        let key = keys
            .get(fingerprint)
            .ok_or_else(|| KeyError::NotFound(fingerprint.to_string()))?;

        if include_private {
            let unlocked = match &key.passphrase {
                None => true,
                Some(expected) => passphrase.is_some_and(|p| p.expose_secret() == expected),
            };
            if !key.private || !unlocked {
                return Err(KeyError::PrivateKeyUnavailable(fingerprint.to_string()).into());
            }
        }

        Ok(Zeroizing::new(
            render_block(fingerprint, key, include_private).into_bytes(),
        ))
    }

    fn list_keys(&self, private_only: bool) -> Result<Vec<KeyRecord>> {
        self.count();
        Ok(self
            .keys()
            .iter()
            .filter(|(_, key)| !private_only || key.private)
            .map(|(fingerprint, key)| record(fingerprint, key))
            .collect())
    }

    fn delete_key(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.count();
        self.mutation(|| -> Result<()> {
            match self.keys().remove(fingerprint) {
                Some(_) => Ok(()),
                None => Err(KeyError::NotFound(fingerprint.to_string()).into()),
            }
        })
    }

    fn encrypt(&self, input: &Path, output: &Path, recipients: &[Fingerprint]) -> Result<()> {
        self.count();
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }

        self.cipher(|| -> Result<()> {
            {
                let keys = self.keys();
                if recipients.iter().any(|r| !keys.contains_key(r)) {
                    return Err(CipherError::EncryptionFailed.into());
                }
            }

            let plaintext = fs::read(input)?;
            let header: Vec<&str> = recipients.iter().map(Fingerprint::as_str).collect();
            let mut body = format!("{} {}\n", MESSAGE_MAGIC, header.join(",")).into_bytes();
            body.extend(plaintext.iter().map(|b| b ^ 0x5A));
            fs::write(output, body)?;
            Ok(())
        })
    }

    fn decrypt(&self, input: &Path, output: &Path, passphrase: Option<&Passphrase>) -> Result<()> {
        self.count();
        self.cipher(|| -> Result<()> {
            let data = fs::read(input)?;
            let corrupt = || CipherError::DecryptionFailed(DecryptFailure::CorruptInput);

            let split = data.iter().position(|&b| b == b'\n').ok_or_else(corrupt)?;
            let header = std::str::from_utf8(&data[..split]).map_err(|_| corrupt())?;
            let recipients = header
                .strip_prefix(MESSAGE_MAGIC)
                .map(str::trim)
                .ok_or_else(corrupt)?;

            let keys = self.keys();
            let key = recipients
                .split(',')
                .filter_map(|r| Fingerprint::parse(r).ok())
                .find_map(|r| keys.get(&r).filter(|k| k.private))
                .ok_or(CipherError::DecryptionFailed(DecryptFailure::NoSecretKey))?;

            let plaintext: Vec<u8> = data[split + 1..].iter().map(|b| b ^ 0x5A).collect();
            if let Some(expected) = &key.passphrase {
                if !passphrase.is_some_and(|p| p.expose_secret() == expected) {
                    // A real engine may have written part of the output already.
                    fs::write(output, &plaintext[..plaintext.len() / 2])?;
                    return Err(CipherError::DecryptionFailed(DecryptFailure::BadPassphrase).into());
                }
            }

            fs::write(output, plaintext)?;
            Ok(())
        })
    }

    fn verify(&self, data: &Path, signature: Option<&Path>) -> Result<Verification> {
        self.count();
        let source = signature.unwrap_or(data);
        let text = fs::read_to_string(source).unwrap_or_default();

        let Some(signer) = text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(SIGNATURE_MAGIC))
            .map(str::trim)
        else {
            return Ok(Verification::Malformed);
        };

        let Ok(fingerprint) = Fingerprint::parse(signer) else {
            return Ok(Verification::Malformed);
        };

        if self.keys().contains_key(&fingerprint) {
            Ok(Verification::Valid { fingerprint })
        } else {
            Ok(Verification::UnknownSigner {
                key_id: fingerprint.key_id().to_string(),
            })
        }
    }

    fn validate_key_format(&self, data: &[u8]) -> Result<KeyFormat> {
        self.count();
        Ok(match parse_blocks(data) {
            Ok(keys) => KeyFormat::WellFormed {
                fingerprints: keys.into_iter().map(|(fpr, _)| fpr).collect(),
            },
            Err(reason) => KeyFormat::Malformed { reason },
        })
    }
}

/// A detached signature this engine accepts as made by `signer`.
pub fn mock_signature(signer: &Fingerprint) -> Vec<u8> {
    format!("{} {}\n", SIGNATURE_MAGIC, signer).into_bytes()
}
