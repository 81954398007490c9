//! GnuPG engine.
//!
//! Drives the `gpg` binary as a subprocess against an explicit home directory.
//! Every invocation runs non-interactively with loopback pinentry, so
//! passphrases arrive only over stdin and the engine never prompts.
//!
//! ## Requirements
//!
//! - GnuPG 2.1.14 or newer on `PATH` (as `gpg` or `gpg2`), or configured by
//!   absolute path
//! - A keyring directory created by [`Keyring::open`]

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::process::{self, Finished, Invocation};
use super::{colons, sniff_key_data, status, Engine};
use crate::core::config::Config;
use crate::core::constants;
use crate::core::domain::{Fingerprint, KeyFormat, KeyParams, KeyRecord, Passphrase, Verification};
use crate::core::keyring::Keyring;
use crate::core::staging::StagingArea;
use crate::error::{CipherError, EngineError, Error, KeyError, Result};

/// Scratch directory inside the keyring for key generation parameters.
const KEYGEN_DIR: &str = "keygen";

/// GnuPG engine bound to one keyring.
#[derive(Debug, Clone)]
pub struct GnuPg {
    program: PathBuf,
    homedir: PathBuf,
    timeout: Duration,
    keygen_timeout: Duration,
    armor: bool,
}

impl GnuPg {
    /// Build an engine for `keyring` using the configured binary.
    ///
    /// A binary that cannot be found is not an error here: it surfaces as
    /// `EngineUnavailable` on the first call, which is what health checks
    /// report.
    pub fn new(config: &Config, keyring: &Keyring) -> Self {
        let program = resolve_program(&config.keyring.engine);
        debug!(program = %program.display(), keyring = %keyring.dir().display(), "engine configured");

        Self {
            program,
            homedir: keyring.dir().to_path_buf(),
            timeout: config.timeout(),
            keygen_timeout: config.keygen_timeout(),
            armor: config.engine.armor,
        }
    }

    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--homedir".into(), self.homedir.clone().into_os_string()];
        args.extend(
            [
                "--batch",
                "--no-tty",
                "--no-greeting",
                "--status-fd",
                "2",
                "--pinentry-mode",
                "loopback",
            ]
            .map(OsString::from),
        );
        args
    }

    fn call(
        &self,
        operation: &'static str,
        extra: Vec<OsString>,
        stdin: Option<Zeroizing<Vec<u8>>>,
        timeout: Duration,
    ) -> Result<Finished> {
        let mut args = self.base_args();
        args.extend(extra);

        let finished = process::run(
            &self.program,
            Invocation {
                operation,
                args,
                stdin,
                timeout,
            },
        )?;

        if !finished.success() {
            debug!(
                operation,
                code = finished.code_or_signal(),
                stderr = %String::from_utf8_lossy(&finished.stderr).trim(),
                "engine reported failure"
            );
        }
        Ok(finished)
    }

    fn listing(&self, secret: bool) -> Result<Vec<KeyRecord>> {
        let operation = if secret { "list-secret" } else { "list" };
        let mode = if secret {
            "--list-secret-keys"
        } else {
            "--list-keys"
        };

        let out = self.call(
            operation,
            os_args(&["--with-colons", "--fixed-list-mode", "--with-fingerprint", mode]),
            None,
            self.timeout,
        )?;

        // Exit 2 with no output is how an empty, never-used keyring answers.
        if !out.success() && !out.stdout.is_empty() {
            return Err(failed(operation, &out));
        }
        Ok(colons::parse_key_listing(&String::from_utf8_lossy(&out.stdout)))
    }

    fn find(&self, fingerprint: &Fingerprint) -> Result<KeyRecord> {
        self.list_keys(false)?
            .into_iter()
            .find(|record| record.fingerprint() == fingerprint)
            .ok_or_else(|| KeyError::NotFound(fingerprint.to_string()).into())
    }

    fn fingerprints(&self) -> Result<BTreeSet<Fingerprint>> {
        Ok(self
            .list_keys(false)?
            .into_iter()
            .map(|record| record.fingerprint().clone())
            .collect())
    }

    /// Delete every key that is not in `before`. Runs under the keyring write
    /// guard, so anything new came from the failed call.
    fn discard_new_keys(&self, before: &BTreeSet<Fingerprint>) {
        let current = match self.fingerprints() {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "cannot list keys to undo failed generation");
                return;
            }
        };
        for fingerprint in current.difference(before) {
            warn!(fingerprint = %fingerprint, "removing key left by failed generation");
            if let Err(e) = self.delete_key(fingerprint) {
                warn!(fingerprint = %fingerprint, error = %e, "removing leftover key failed");
            }
        }
    }

    /// Parse key data without touching the keyring.
    fn show_only(&self, data: &[u8]) -> Result<Vec<Fingerprint>> {
        let out = self.call(
            "inspect",
            os_args(&[
                "--with-colons",
                "--fixed-list-mode",
                "--with-fingerprint",
                "--import-options",
                "show-only",
                "--import",
            ]),
            Some(Zeroizing::new(data.to_vec())),
            self.timeout,
        )?;

        let mut seen = BTreeSet::new();
        Ok(colons::parse_key_listing(&String::from_utf8_lossy(&out.stdout))
            .into_iter()
            .map(|record| record.fingerprint().clone())
            .filter(|fpr| seen.insert(fpr.clone()))
            .collect())
    }
}

impl Engine for GnuPg {
    fn name(&self) -> &'static str {
        "gnupg"
    }

    fn probe(&self) -> Result<String> {
        let out = self.call("probe", os_args(&["--version"]), None, self.timeout)?;
        if !out.success() {
            return Err(failed("probe", &out));
        }

        String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| EngineError::UnexpectedOutput("probe").into())
    }

    fn generate_key(
        &self,
        params: &KeyParams,
        passphrase: Option<&Passphrase>,
    ) -> Result<KeyRecord> {
        info!(bits = params.length_bits(), "generating key pair");

        let before = self.fingerprints()?;

        // Parameters go through a file so stdin stays free for the
        // passphrase. Loopback answers every request gpg makes from that fd,
        // including the unlock it needs while binding the subkey.
        let scratch = StagingArea::open(&self.homedir.join(KEYGEN_DIR), Duration::ZERO)?;
        let parameters = key_parameters(params, passphrase.is_some());
        let parameters = scratch.stage(parameters.as_bytes(), "params")?;

        let mut args = Vec::new();
        let stdin = passphrase.map(|passphrase| {
            args.extend(os_args(&["--passphrase-fd", "0"]));
            passphrase_input(passphrase)
        });
        args.push(OsString::from("--gen-key"));
        args.push(parameters.path().as_os_str().to_os_string());

        let result = self.call("generate", args, stdin, self.keygen_timeout);
        drop(parameters);
        let out = match result {
            Ok(out) if out.success() => out,
            other => {
                // gpg can fail after the key is already on disk.
                self.discard_new_keys(&before);
                return Err(match other {
                    Ok(out) => failed("generate", &out),
                    Err(e) => e,
                });
            }
        };

        let stderr = String::from_utf8_lossy(&out.stderr);
        let fingerprint = status::created_fingerprint(&stderr)
            .and_then(|raw| Fingerprint::parse(&raw).ok())
            .ok_or(EngineError::UnexpectedOutput("generate"))?;

        let record = self
            .find(&fingerprint)
            .map_err(|_| EngineError::UnexpectedOutput("generate"))?;
        info!(fingerprint = %record.fingerprint(), "generated key pair");
        Ok(record)
    }

    fn import_key(&self, data: &[u8]) -> Result<Vec<KeyRecord>> {
        let expected = match self.validate_key_format(data)? {
            KeyFormat::WellFormed { fingerprints } => fingerprints,
            KeyFormat::Malformed { reason } => return Err(KeyError::Malformed(reason).into()),
        };

        let before = self.fingerprints()?;

        let out = self.call(
            "import",
            os_args(&["--import"]),
            Some(Zeroizing::new(data.to_vec())),
            self.timeout,
        )?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        let imported: BTreeSet<Fingerprint> = status::imported_fingerprints(&stderr)
            .iter()
            .filter_map(|raw| Fingerprint::parse(raw).ok())
            .collect();

        // The whole block goes in or nothing does.
        let missing: Vec<&Fingerprint> = expected.iter().filter(|f| !imported.contains(f)).collect();
        if !missing.is_empty() {
            warn!(rejected = missing.len(), "engine rejected part of the key block, rolling back");
            for fingerprint in imported.iter().filter(|f| !before.contains(f)) {
                if let Err(e) = self.delete_key(fingerprint) {
                    warn!(fingerprint = %fingerprint, error = %e, "rollback of imported key failed");
                }
            }
            return Err(KeyError::Malformed(format!(
                "{} key(s) in the block could not be imported",
                missing.len()
            ))
            .into());
        }

        let records: Vec<KeyRecord> = self
            .list_keys(false)?
            .into_iter()
            .filter(|record| imported.contains(record.fingerprint()))
            .collect();

        info!(
            keys = records.len(),
            new = imported.iter().filter(|f| !before.contains(f)).count(),
            "imported keys"
        );
        Ok(records)
    }

    fn export_key(
        &self,
        fingerprint: &Fingerprint,
        include_private: bool,
        passphrase: Option<&Passphrase>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let record = self.find(fingerprint)?;
        if include_private && !record.has_private_component() {
            return Err(KeyError::PrivateKeyUnavailable(fingerprint.to_string()).into());
        }

        let mut args = Vec::new();
        if self.armor {
            args.push(OsString::from("--armor"));
        }
        let stdin = match passphrase {
            Some(passphrase) if include_private => {
                args.extend(os_args(&["--passphrase-fd", "0"]));
                Some(passphrase_input(passphrase))
            }
            _ => None,
        };
        args.push(OsString::from(if include_private {
            "--export-secret-keys"
        } else {
            "--export"
        }));
        args.push(OsString::from(fingerprint.as_str()));

        let operation = if include_private {
            "export-secret"
        } else {
            "export"
        };
        let out = self.call(operation, args, stdin, self.timeout)?;

        if !out.success() || out.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if include_private
                && (status::passphrase_rejected(&stderr) || status::passphrase_missing(&stderr))
            {
                return Err(KeyError::PrivateKeyUnavailable(fingerprint.to_string()).into());
            }
            return Err(failed(operation, &out));
        }

        debug!(fingerprint = %fingerprint, private = include_private, "exported key");
        Ok(Zeroizing::new(out.stdout))
    }

    fn list_keys(&self, private_only: bool) -> Result<Vec<KeyRecord>> {
        let secret = self.listing(true)?;
        if private_only {
            return Ok(secret);
        }

        let with_secret: BTreeSet<Fingerprint> = secret
            .iter()
            .filter(|record| record.has_private_component())
            .map(|record| record.fingerprint().clone())
            .collect();

        Ok(self
            .listing(false)?
            .into_iter()
            .map(|record| {
                let private = with_secret.contains(record.fingerprint());
                record.with_private_component(private)
            })
            .collect())
    }

    fn delete_key(&self, fingerprint: &Fingerprint) -> Result<()> {
        let record = self.find(fingerprint)?;

        let mode = if record.has_private_component() {
            "--delete-secret-and-public-key"
        } else {
            "--delete-keys"
        };
        let out = self.call(
            "delete",
            os_args(&["--yes", mode, fingerprint.as_str()]),
            None,
            self.timeout,
        )?;
        if !out.success() {
            return Err(failed("delete", &out));
        }

        info!(fingerprint = %fingerprint, "deleted key");
        Ok(())
    }

    fn encrypt(&self, input: &Path, output: &Path, recipients: &[Fingerprint]) -> Result<()> {
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }

        let mut args = os_args(&["--yes", "--no-encrypt-to", "--trust-model", "always"]);
        if self.armor {
            args.push("--armor".into());
        }
        for recipient in recipients {
            // A full fingerprint names exactly one key; the engine picks its
            // encryption subkey.
            args.push("--recipient".into());
            args.push(recipient.as_str().into());
        }
        args.push("--output".into());
        args.push(output.as_os_str().to_os_string());
        args.push("--encrypt".into());
        args.push(input.as_os_str().to_os_string());

        let out = self.call("encrypt", args, None, self.timeout)?;
        if !out.success() {
            return Err(CipherError::EncryptionFailed.into());
        }
        Ok(())
    }

    fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        let mut args = os_args(&["--yes"]);
        let stdin = passphrase.map(|passphrase| {
            args.extend(os_args(&["--passphrase-fd", "0"]));
            passphrase_input(passphrase)
        });
        args.push("--output".into());
        args.push(output.as_os_str().to_os_string());
        args.push("--decrypt".into());
        args.push(input.as_os_str().to_os_string());

        let out = self.call("decrypt", args, stdin, self.timeout)?;
        if !out.success() {
            let reason = status::decrypt_failure(&String::from_utf8_lossy(&out.stderr));
            return Err(CipherError::DecryptionFailed(reason).into());
        }
        Ok(())
    }

    fn verify(&self, data: &Path, signature: Option<&Path>) -> Result<Verification> {
        let mut args = os_args(&["--verify"]);
        if let Some(signature) = signature {
            args.push(signature.as_os_str().to_os_string());
        }
        args.push(data.as_os_str().to_os_string());

        // A bad or unknown signature exits non-zero; the status lines carry
        // the verdict either way.
        let out = self.call("verify", args, None, self.timeout)?;
        Ok(status::verification(&String::from_utf8_lossy(&out.stderr)))
    }

    fn validate_key_format(&self, data: &[u8]) -> Result<KeyFormat> {
        if let Err(reason) = sniff_key_data(data) {
            return Ok(KeyFormat::Malformed {
                reason: reason.to_string(),
            });
        }

        let fingerprints = self.show_only(data)?;
        if fingerprints.is_empty() {
            return Ok(KeyFormat::Malformed {
                reason: "no keys found in data".to_string(),
            });
        }
        Ok(KeyFormat::WellFormed { fingerprints })
    }
}

/// Find the engine binary. Explicit paths are used as given; bare names are
/// looked up on `PATH`, trying `gpg2` when the default `gpg` is missing.
fn resolve_program(engine: &str) -> PathBuf {
    if engine.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(engine);
    }
    if let Ok(path) = which::which(engine) {
        return path;
    }
    if engine == constants::DEFAULT_ENGINE {
        if let Ok(path) = which::which(constants::FALLBACK_ENGINE) {
            return path;
        }
    }
    warn!(engine, "engine binary not found on PATH");
    PathBuf::from(engine)
}

/// Batch parameters for `--gen-key`. The passphrase never goes in here; a
/// protected key takes it from `--passphrase-fd`.
fn key_parameters(params: &KeyParams, protected: bool) -> String {
    let expire = params
        .expires_in_days()
        .map_or_else(|| "0".to_string(), |days| format!("{}d", days));

    let mut batch = format!(
        "Key-Type: RSA\n\
         Key-Length: {bits}\n\
         Key-Usage: sign\n\
         Subkey-Type: RSA\n\
         Subkey-Length: {bits}\n\
         Subkey-Usage: encrypt\n\
         Name-Real: {name}\n\
         Name-Email: {email}\n\
         Expire-Date: {expire}\n",
        bits = params.length_bits(),
        name = params.name(),
        email = params.email(),
        expire = expire,
    );
    if !protected {
        batch.push_str("%no-protection\n");
    }
    batch.push_str("%commit\n");
    batch
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Passphrase as read by `--passphrase-fd 0`: one line.
fn passphrase_input(passphrase: &Passphrase) -> Zeroizing<Vec<u8>> {
    let secret = passphrase.expose_secret().as_bytes();
    let mut buf = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    buf.extend_from_slice(secret);
    buf.push(b'\n');
    buf
}

fn failed(operation: &'static str, out: &Finished) -> Error {
    EngineError::Failed {
        operation,
        code: out.code_or_signal(),
    }
    .into()
}
