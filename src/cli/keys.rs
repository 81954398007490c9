//! Key commands.

use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::cli::{output, prompt};
use crate::core::domain::{KeyFormat, KeyParams, KeyRecord};
use crate::core::service::Keysmith;
use crate::error::{KeyError, Result};

/// Generate a key pair.
pub fn generate(
    app: &Keysmith,
    name: Option<String>,
    email: &str,
    length: u32,
    expires_days: u32,
    ask_passphrase: bool,
    json: bool,
) -> Result<()> {
    let name = name.unwrap_or_else(whoami::realname);
    let params = KeyParams::new(&name, email, length)?.with_expiry_days(expires_days);
    let passphrase = prompt::passphrase(ask_passphrase, true)?;
    let protected = passphrase.is_some();

    if !json {
        output::dimmed(&format!(
            "generating {}-bit RSA key, this can take a while...",
            length
        ));
    }
    let record = app.keys().generate(&params, passphrase)?;

    if json {
        output::data(&serde_json::to_string_pretty(&record)?);
    } else {
        output::success(&format!(
            "generated {}",
            output::highlight(record.fingerprint().as_str())
        ));
        print_record(&record);
        if !protected {
            output::hint("private key has no passphrase; use --ask-passphrase to protect it");
        }
    }
    Ok(())
}

/// Import keys from a file.
pub fn import(app: &Keysmith, file: &Path, json: bool) -> Result<()> {
    let data = fs::read(file)?;
    let records = app.keys().import_key(&data)?;

    if json {
        output::data(&serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    output::success(&format!(
        "imported {} key{}",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    ));
    for record in &records {
        output::list_item(&summary(record));
    }
    Ok(())
}

/// Export a key to stdout or a file.
pub fn export(
    app: &Keysmith,
    id: &str,
    private: bool,
    dest: Option<&Path>,
    ask_passphrase: bool,
) -> Result<()> {
    let passphrase = if private {
        prompt::passphrase(ask_passphrase, false)?
    } else {
        None
    };
    let exported = app.keys().export_key(id, private, passphrase)?;

    match dest {
        Some(dest) => {
            write_restricted(dest, &exported, private)?;
            output::success(&format!(
                "exported {} to {}",
                if private { "private key" } else { "public key" },
                output::highlight(&dest.display().to_string())
            ));
        }
        None => output::bytes(&exported)?,
    }
    Ok(())
}

/// List keys.
pub fn list(app: &Keysmith, private_only: bool, json: bool) -> Result<()> {
    let records = app.keys().list_keys(private_only)?;

    if json {
        let result = serde_json::json!({
            "keys": records,
            "count": records.len(),
        });
        output::data(&serde_json::to_string_pretty(&result)?);
    } else if records.is_empty() {
        output::dimmed("no keys in keyring");
    } else {
        output::blank();
        output::header(&format!(
            "{} {}",
            records.len(),
            if private_only { "private keys" } else { "keys" }
        ));
        output::rule();
        for record in &records {
            output::list_item(&summary(record));
        }
    }
    Ok(())
}

/// Show one key.
pub fn info(app: &Keysmith, id: &str, json: bool) -> Result<()> {
    let record = app.keys().get_key_info(id)?;

    if json {
        output::data(&serde_json::to_string_pretty(&record)?);
    } else {
        output::header(&output::highlight(record.fingerprint().as_str()));
        print_record(&record);
    }
    Ok(())
}

/// Delete a key after confirmation.
pub fn delete(app: &Keysmith, fingerprint: &str, yes: bool) -> Result<()> {
    if !yes {
        let record = app.keys().get_key_info(fingerprint)?;
        let question = format!(
            "Delete {}{}? This cannot be undone",
            summary(&record),
            if record.has_private_component() {
                " including its private key"
            } else {
                ""
            }
        );
        if !prompt::confirm(&question)? {
            output::warn("not deleted");
            if !prompt::is_interactive() {
                output::hint("pass --yes to delete without a prompt");
            }
            return Ok(());
        }
    }

    app.keys().delete_key(fingerprint)?;
    output::success(&format!("deleted {}", output::highlight(fingerprint)));
    Ok(())
}

/// Check a key file without importing it.
pub fn validate(app: &Keysmith, file: &Path, json: bool) -> Result<()> {
    let data = fs::read(file)?;
    let format = app.keys().validate_key_format(&data)?;

    if json {
        output::data(&serde_json::to_string_pretty(&format)?);
    }

    match format {
        KeyFormat::WellFormed { fingerprints } => {
            if !json {
                output::success(&format!(
                    "well-formed key block with {} key{}",
                    fingerprints.len(),
                    if fingerprints.len() == 1 { "" } else { "s" }
                ));
                for fingerprint in &fingerprints {
                    output::list_item(fingerprint.as_str());
                }
            }
            Ok(())
        }
        KeyFormat::Malformed { reason } => Err(KeyError::Malformed(reason).into()),
    }
}

/// One-line description: `89ABCDEF01234567  Alice <alice@example.com>  [sec]`
fn summary(record: &KeyRecord) -> String {
    let uid = record
        .primary_user_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "(no user ID)".to_string());
    let mut flags = Vec::new();
    if record.has_private_component() {
        flags.push("sec");
    }
    if record.is_expired() {
        flags.push("expired");
    }
    if record.validity().is_unusable() && !record.is_expired() {
        flags.push("unusable");
    }

    if flags.is_empty() {
        format!("{}  {}", record.key_id(), uid)
    } else {
        format!("{}  {}  [{}]", record.key_id(), uid, flags.join(", "))
    }
}

fn print_record(record: &KeyRecord) {
    output::kv("fingerprint", record.fingerprint());
    output::kv("key id", record.key_id());
    for uid in record.user_ids() {
        output::kv("user id", uid);
    }
    output::kv(
        "algorithm",
        format!("{} {}", record.algorithm(), record.key_length_bits()),
    );
    output::kv("created", record.creation_time().format("%Y-%m-%d"));
    match record.expiration_time() {
        Some(expires) if expires <= Utc::now() => {
            output::kv("expires", format!("{} (expired)", expires.format("%Y-%m-%d")))
        }
        Some(expires) => output::kv("expires", expires.format("%Y-%m-%d")),
        None => output::kv("expires", "never"),
    }
    output::kv(
        "private",
        if record.has_private_component() {
            "yes"
        } else {
            "no"
        },
    );
}

/// Write key material, owner-only when it is private.
fn write_restricted(dest: &Path, content: &[u8], private: bool) -> Result<()> {
    #[cfg(unix)]
    {
        if private {
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(dest)?;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
            file.write_all(content)?;
            return Ok(());
        }
    }

    #[cfg(not(unix))]
    let _ = private;

    fs::write(dest, content)?;
    Ok(())
}
