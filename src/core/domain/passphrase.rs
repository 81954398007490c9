//! Ephemeral passphrase handling.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::{Result, ValidationError};

/// A passphrase held only for the duration of one engine call.
///
/// The buffer is wiped on drop. There is no `Display` or
/// `Serialize` impl, and `Debug` is redacted.
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    /// Wrap a passphrase.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPassphrase` if it is empty or contains
    /// a line break or NUL, since the engine reads it as a single line.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());

        if secret.is_empty() {
            return Err(ValidationError::InvalidPassphrase("passphrase is empty").into());
        }
        if secret.contains(['\n', '\r', '\0']) {
            return Err(
                ValidationError::InvalidPassphrase("passphrase contains a line break").into(),
            );
        }

        Ok(Self(secret))
    }

    /// Borrow the secret. Only engine clients should call this.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let p = Passphrase::new("correct horse").unwrap();
        let rendered = format!("{:?}", p);
        assert!(!rendered.contains("correct"));
        assert_eq!(p.expose_secret(), "correct horse");
    }

    #[test]
    fn test_rejects_empty_and_multiline() {
        assert!(Passphrase::new("").is_err());
        assert!(Passphrase::new("line\nbreak").is_err());
        assert!(Passphrase::new("carriage\rreturn").is_err());
    }
}
