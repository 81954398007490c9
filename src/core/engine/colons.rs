//! Parser for the engine's colon-delimited key listings.
//!
//! Only the records needed for [`KeyRecord`] are read: `pub`/`sec` (primary
//! key), the `fpr` that follows it, and `uid`. Subkey records are skipped.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::core::domain::{Algorithm, Capabilities, Fingerprint, KeyRecord, UserId, Validity};

/// Field indexes (0-based) of the colon format.
const F_VALIDITY: usize = 1;
const F_LENGTH: usize = 2;
const F_ALGO: usize = 3;
const F_CREATED: usize = 5;
const F_EXPIRES: usize = 6;
const F_USER_ID: usize = 9;
const F_CAPS: usize = 11;
const F_TOKEN: usize = 14;

#[derive(Default)]
struct Pending {
    secret: bool,
    validity: String,
    length: u32,
    algorithm: u8,
    created: Option<DateTime<Utc>>,
    expires: Option<DateTime<Utc>>,
    capabilities: String,
    fingerprint: Option<String>,
    user_ids: Vec<UserId>,
}

impl Pending {
    fn finish(self) -> Option<KeyRecord> {
        let Some(raw) = self.fingerprint else {
            warn!("key listing entry without fingerprint");
            return None;
        };
        let fingerprint = match Fingerprint::parse(&raw) {
            Ok(fingerprint) => fingerprint,
            Err(_) => {
                warn!(fingerprint = %raw, "unparseable fingerprint in key listing");
                return None;
            }
        };

        let mut record = KeyRecord::new(
            fingerprint,
            Algorithm::from_code(self.algorithm),
            self.length,
            self.created.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        )
        .with_expiration(self.expires)
        .with_private_component(self.secret)
        .with_validity(Validity::from_flag(&self.validity))
        .with_capabilities(Capabilities::from_flags(&self.capabilities));

        for uid in self.user_ids {
            record = record.with_user_id(uid);
        }
        Some(record)
    }
}

#[derive(PartialEq)]
enum Last {
    Primary,
    Subkey,
    Other,
}

/// Parse a `--with-colons --fixed-list-mode` listing into key records.
///
/// `sec` entries whose token field is `#` are stubs without usable secret
/// material and are reported as public-only.
pub(super) fn parse_key_listing(output: &str) -> Vec<KeyRecord> {
    let mut records = Vec::new();
    let mut current: Option<Pending> = None;
    let mut last = Last::Other;

    for line in output.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        match field(0) {
            kind @ ("pub" | "sec") => {
                if let Some(done) = current.take().and_then(Pending::finish) {
                    records.push(done);
                }
                current = Some(Pending {
                    secret: kind == "sec" && field(F_TOKEN) != "#",
                    validity: field(F_VALIDITY).to_string(),
                    length: field(F_LENGTH).parse().unwrap_or(0),
                    algorithm: field(F_ALGO).parse().unwrap_or(0),
                    created: parse_time(field(F_CREATED)),
                    expires: parse_time(field(F_EXPIRES)),
                    capabilities: field(F_CAPS).to_string(),
                    ..Pending::default()
                });
                last = Last::Primary;
            }
            "fpr" => {
                if last == Last::Primary {
                    if let Some(pending) = current.as_mut() {
                        if pending.fingerprint.is_none() {
                            pending.fingerprint = Some(field(F_USER_ID).to_string());
                        }
                    }
                }
            }
            "uid" => {
                if let Some(pending) = current.as_mut() {
                    pending.user_ids.push(UserId::parse(&unescape(field(F_USER_ID))));
                }
                last = Last::Other;
            }
            "sub" | "ssb" => last = Last::Subkey,
            _ => {}
        }
    }

    if let Some(done) = current.and_then(Pending::finish) {
        records.push(done);
    }
    records
}

/// Timestamps are epoch seconds, or `YYYYMMDDThhmmss` in ISO mode.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        if secs == 0 {
            return None;
        }
        return DateTime::<Utc>::from_timestamp(secs, 0);
    }
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decode `\xHH` escapes used for colons and non-printables in user IDs.
fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() && bytes[i + 1] == b'x' {
            let decoded = std::str::from_utf8(&bytes[i + 2..i + 4])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
