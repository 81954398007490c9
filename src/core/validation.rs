//! Input validation for keysmith operations.
//!
//! Everything here runs before the engine is touched, so a rejected request
//! never costs a subprocess.

use crate::core::constants;
use crate::error::{Result, ValidationError};

/// Validate a user ID name.
///
/// Names end up inside engine parameter files, so line breaks and the
/// angle brackets that delimit the email part are rejected.
///
/// # Errors
///
/// Returns `ValidationError` if the name is empty or contains forbidden
/// characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }

    for (i, ch) in name.chars().enumerate() {
        if ch.is_control() {
            return Err(ValidationError::InvalidName(format!(
                "control character at position {}",
                i + 1
            ))
            .into());
        }
        if ch == '<' || ch == '>' {
            return Err(ValidationError::InvalidName(format!(
                "'{}' is not allowed (position {})",
                ch,
                i + 1
            ))
            .into());
        }
    }

    Ok(())
}

/// Validate an email address against a basic `local@domain` grammar.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` when either side is empty, there
/// is not exactly one `@`, or the address contains whitespace, control
/// characters or angle brackets.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || ValidationError::InvalidEmail(email.to_string());

    if email
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
    {
        return Err(invalid().into());
    }

    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().ok_or_else(invalid)?;

    if parts.next().is_some() || local.is_empty() || domain.is_empty() {
        return Err(invalid().into());
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid().into());
    }

    Ok(())
}

/// Validate a requested key length.
///
/// # Errors
///
/// Returns `ValidationError::UnsupportedKeyLength` outside 2048/3072/4096.
pub fn validate_key_length(bits: u32) -> Result<()> {
    if constants::ALLOWED_KEY_LENGTHS.contains(&bits) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedKeyLength(bits).into())
    }
}

/// Validate an uploaded file name against an extension allowlist.
///
/// An empty allowlist accepts everything. Comparison is case-insensitive.
///
/// # Errors
///
/// Returns `ValidationError::DisallowedExtension` if the file has no
/// extension or one outside the list.
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty());

    match ext {
        Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => Ok(()),
        _ => Err(ValidationError::DisallowedExtension(filename.to_string()).into()),
    }
}

/// Check that a path has exactly the given permission bits (Unix only).
///
/// Returns the actual mode on mismatch so callers can decide whether to warn
/// or fail.
#[cfg(unix)]
pub fn check_permissions(path: &std::path::Path, expected_mode: u32) -> Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)?;
    let actual_mode = metadata.permissions().mode() & 0o777;

    if actual_mode == expected_mode {
        Ok(None)
    } else {
        Ok(Some(actual_mode))
    }
}
