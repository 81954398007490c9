//! Keysmith - OpenPGP keyring and file cipher service.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keysmith::cli::output;
use keysmith::cli::{execute, Cli};
use keysmith::core::constants;
use keysmith::error::{DecryptFailure, Error, ErrorKind};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(constants::LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("keysmith=debug")
        } else {
            EnvFilter::new("keysmith=warn")
        }
    });

    // Logs go to stderr; stdout carries exported keys and JSON.
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    if let Err(e) = execute(cli.command, cli.config) {
        output::error(&e.to_string());
        if let Some(hint) = suggestion(&e) {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

fn suggestion(e: &Error) -> Option<&'static str> {
    if let Error::Cipher(keysmith::error::CipherError::DecryptionFailed(reason)) = e {
        return match reason {
            DecryptFailure::BadPassphrase => {
                Some("retry with --ask-passphrase or set KEYSMITH_PASSPHRASE")
            }
            DecryptFailure::NoSecretKey => Some("import the recipient's private key first"),
            _ => None,
        };
    }

    match e.kind() {
        ErrorKind::EngineUnavailable => {
            Some("install GnuPG or set [keyring] engine in config.toml; then retry")
        }
        ErrorKind::EngineTimeout => Some("retry, or raise [engine] timeout_secs in config.toml"),
        ErrorKind::KeyNotFound | ErrorKind::UnknownRecipient => Some("run: keysmith keys list"),
        ErrorKind::PayloadTooLarge => Some("raise [staging] max_payload_bytes in config.toml"),
        _ => None,
    }
}
