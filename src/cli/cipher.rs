//! Encrypt, decrypt and verify commands.

use std::path::{Path, PathBuf};

use crate::cli::{output, prompt};
use crate::core::config::Config;
use crate::core::domain::{Fingerprint, Upload, Verification};
use crate::core::service::Keysmith;
use crate::error::{CipherError, ErrorKind, Result};

/// Encrypt a file.
pub fn encrypt(
    app: &Keysmith,
    config: &Config,
    file: &Path,
    recipients: &[String],
    dest: Option<PathBuf>,
) -> Result<()> {
    let fingerprints = recipients
        .iter()
        .map(|query| resolve_recipient(app, query))
        .collect::<Result<Vec<_>>>()?;

    let upload = Upload::from_path(file)?;
    let size = upload.len();
    let outcome = app.cipher().encrypt_file(&upload, &fingerprints)?;

    let dest = dest.unwrap_or_else(|| {
        let ext = if config.engine.armor { "asc" } else { "gpg" };
        append_extension(file, ext)
    });
    let job = outcome.persist(&dest)?;

    output::success(&format!(
        "encrypted {} ({}) for {} recipient{}",
        output::highlight(&dest.display().to_string()),
        output::format_size(size),
        job.recipients().len(),
        if job.recipients().len() == 1 { "" } else { "s" }
    ));
    Ok(())
}

/// Decrypt a file.
pub fn decrypt(app: &Keysmith, file: &Path, dest: Option<PathBuf>, ask_passphrase: bool) -> Result<()> {
    let upload = Upload::from_path(file)?;
    let passphrase = prompt::passphrase(ask_passphrase, false)?;

    let outcome = app.cipher().decrypt_file(&upload, passphrase)?;
    let size = outcome.output().len()?;

    let dest = dest.unwrap_or_else(|| decrypted_path(file));
    outcome.persist(&dest)?;

    output::success(&format!(
        "decrypted {} ({})",
        output::highlight(&dest.display().to_string()),
        output::format_size(size)
    ));
    Ok(())
}

/// Verify a signature. Exits non-zero unless the signature is good.
pub fn verify(app: &Keysmith, file: &Path, signature: Option<&Path>, json: bool) -> Result<()> {
    let data = Upload::from_path(file)?;
    let signature = signature.map(Upload::from_path).transpose()?;

    let outcome = app.cipher().verify_file(&data, signature.as_ref())?;

    if json {
        output::data(&serde_json::to_string_pretty(&outcome.verification)?);
    } else {
        match &outcome.verification {
            Verification::Valid { fingerprint } => output::success(&format!(
                "good signature from {}",
                output::highlight(fingerprint.as_str())
            )),
            Verification::Bad { key_id } => {
                output::error(&format!("BAD signature from key {}", key_id))
            }
            Verification::UnknownSigner { key_id } => {
                output::warn(&format!("signed by unknown key {}", key_id));
                output::hint("import the signer's public key to check it");
            }
            Verification::Malformed => output::error("no signature found"),
        }
    }

    if !outcome.verification.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

/// Full fingerprints pass straight through; key IDs are looked up.
fn resolve_recipient(app: &Keysmith, query: &str) -> Result<Fingerprint> {
    if let Ok(fingerprint) = Fingerprint::parse(query) {
        return Ok(fingerprint);
    }
    match app.keys().get_key_info(query) {
        Ok(record) => Ok(record.fingerprint().clone()),
        Err(e) if e.kind() == ErrorKind::KeyNotFound => {
            Err(CipherError::UnknownRecipient(query.to_string()).into())
        }
        Err(e) => Err(e),
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// `secret.txt.asc` → `secret.txt`; anything else gets `.out` appended.
fn decrypted_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ["asc", "gpg", "pgp"].contains(&ext.to_ascii_lowercase().as_str()) => {
            path.with_extension("")
        }
        _ => append_extension(path, "out"),
    }
}
