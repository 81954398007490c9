//! Interactive input.
//!
//! Passphrases never come from the command line, where they would end up in
//! shell history and process listings. They are read from
//! `KEYSMITH_PASSPHRASE` or prompted for on a terminal.

use dialoguer::{Confirm, Password};
use zeroize::Zeroizing;

use crate::core::constants;
use crate::core::domain::Passphrase;
use crate::error::{Error, Result, ValidationError};

pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr)
}

/// Obtain a passphrase if one was supplied or asked for.
///
/// The environment variable wins over `ask`. With `confirm`, the prompt asks
/// twice.
pub fn passphrase(ask: bool, confirm: bool) -> Result<Option<Passphrase>> {
    if let Some(value) = std::env::var_os(constants::PASSPHRASE_ENV) {
        let value = Zeroizing::new(value.to_string_lossy().into_owned());
        if !value.is_empty() {
            return Passphrase::new(value.as_str()).map(Some);
        }
    }

    if !ask {
        return Ok(None);
    }
    if !is_interactive() {
        return Err(ValidationError::InvalidPassphrase(
            "no terminal to prompt on; set KEYSMITH_PASSPHRASE",
        )
        .into());
    }

    let mut prompt = Password::new().with_prompt("Passphrase");
    if confirm {
        prompt = prompt.with_confirmation("Repeat passphrase", "passphrases do not match");
    }
    let secret = Zeroizing::new(
        prompt
            .interact()
            .map_err(|e| Error::Internal(format!("passphrase prompt failed: {}", e)))?,
    );

    Passphrase::new(secret.as_str()).map(Some)
}

/// Ask a yes/no question, defaulting to no. Without a terminal the answer
/// is no.
pub fn confirm(question: &str) -> Result<bool> {
    if !is_interactive() {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| Error::Internal(format!("prompt failed: {}", e)))
}
