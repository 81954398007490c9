//! Machine-readable status lines (`--status-fd`).
//!
//! Status keywords are the engine's stable interface; its human-readable
//! messages are not, so every decision about an outcome is made from these
//! lines alone.

use crate::core::domain::{Fingerprint, Verification};
use crate::error::DecryptFailure;

const PREFIX: &str = "[GNUPG:] ";

/// gpg-error codes (low 16 bits of the ERROR status code).
const ERR_BAD_PASSPHRASE: u32 = 11;
const ERR_NO_SECKEY: u32 = 17;
const ERR_NO_DATA: u32 = 58;
const ERR_NO_PASSPHRASE: u32 = 177;

/// One parsed status line.
pub(super) struct Status<'a> {
    pub keyword: &'a str,
    pub args: Vec<&'a str>,
}

/// Iterate status lines in mixed engine output.
pub(super) fn lines(output: &str) -> impl Iterator<Item = Status<'_>> {
    output.lines().filter_map(|line| {
        let rest = line.strip_prefix(PREFIX)?;
        let mut parts = rest.split(' ');
        let keyword = parts.next()?;
        Some(Status {
            keyword,
            args: parts.collect(),
        })
    })
}

pub(super) fn has(output: &str, keyword: &str) -> bool {
    lines(output).any(|s| s.keyword == keyword)
}

/// Fingerprint reported by `KEY_CREATED <type> <fpr>`.
pub(super) fn created_fingerprint(output: &str) -> Option<String> {
    lines(output)
        .find(|s| s.keyword == "KEY_CREATED")
        .and_then(|s| s.args.get(1).map(|fpr| fpr.to_string()))
}

/// Fingerprints reported by `IMPORT_OK <reason> <fpr>`, in order, deduplicated.
pub(super) fn imported_fingerprints(output: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for status in lines(output).filter(|s| s.keyword == "IMPORT_OK") {
        if let Some(fpr) = status.args.get(1) {
            if !seen.iter().any(|s: &String| s == fpr) {
                seen.push(fpr.to_string());
            }
        }
    }
    seen
}

/// Low 16 bits of every `ERROR <location> <code>` line.
fn error_codes(output: &str) -> Vec<u32> {
    lines(output)
        .filter(|s| s.keyword == "ERROR" || s.keyword == "FAILURE")
        .filter_map(|s| s.args.last().and_then(|c| c.parse::<u32>().ok()))
        .map(|code| code & 0xFFFF)
        .collect()
}

/// Whether the engine refused the passphrase it was given.
pub(super) fn passphrase_rejected(output: &str) -> bool {
    has(output, "BAD_PASSPHRASE") || error_codes(output).contains(&ERR_BAD_PASSPHRASE)
}

/// Whether the engine wanted a passphrase and none was supplied. Only
/// meaningful for a failed call: `NEED_PASSPHRASE` also precedes successful
/// unlocks.
pub(super) fn passphrase_missing(output: &str) -> bool {
    has(output, "MISSING_PASSPHRASE")
        || has(output, "NEED_PASSPHRASE")
        || error_codes(output).contains(&ERR_NO_PASSPHRASE)
}

/// Classify a failed decryption.
pub(super) fn decrypt_failure(output: &str) -> DecryptFailure {
    if passphrase_rejected(output) {
        return DecryptFailure::BadPassphrase;
    }

    let codes = error_codes(output);
    if has(output, "NODATA") || has(output, "BADMDC") || codes.contains(&ERR_NO_DATA) {
        return DecryptFailure::CorruptInput;
    }
    if has(output, "NO_SECKEY") || codes.contains(&ERR_NO_SECKEY) {
        return DecryptFailure::NoSecretKey;
    }
    if passphrase_missing(output) {
        return DecryptFailure::BadPassphrase;
    }
    DecryptFailure::Unknown
}

/// Interpret the status output of a verification.
pub(super) fn verification(output: &str) -> Verification {
    for status in lines(output) {
        match status.keyword {
            "VALIDSIG" => {
                if let Some(fingerprint) = status
                    .args
                    .first()
                    .and_then(|raw| Fingerprint::parse(raw).ok())
                {
                    return Verification::Valid { fingerprint };
                }
            }
            "BADSIG" => {
                return Verification::Bad {
                    key_id: status.args.first().unwrap_or(&"").to_string(),
                }
            }
            "NO_PUBKEY" => {
                return Verification::UnknownSigner {
                    key_id: status.args.first().unwrap_or(&"").to_string(),
                }
            }
            _ => {}
        }
    }
    Verification::Malformed
}
