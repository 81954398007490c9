//! Command-line interface.

pub mod cipher;
pub mod completions;
pub mod health;
pub mod keys;
pub mod output;
pub mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::core::constants;
use crate::core::service::Keysmith;
use crate::error::Result;

/// Keysmith - OpenPGP keyring and file cipher service.
#[derive(Parser)]
#[command(
    name = "keysmith",
    about = "Manage an OpenPGP keyring and encrypt, decrypt and verify files",
    version
)]
pub struct Cli {
    /// Config file (default: $KEYSMITH_CONFIG or ~/.keysmith/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Manage keys in the keyring
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Encrypt a file to one or more recipients
    Encrypt {
        /// File to encrypt
        file: PathBuf,
        /// Recipient fingerprint or key ID (repeatable)
        #[arg(short, long = "recipient", value_name = "KEY")]
        recipients: Vec<String>,
        /// Output path (default: <file>.asc, or <file>.gpg without armor)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a file
    Decrypt {
        /// File to decrypt
        file: PathBuf,
        /// Output path (default: input without its .asc/.gpg/.pgp extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Prompt for the private key passphrase
        #[arg(short = 'p', long)]
        ask_passphrase: bool,
    },

    /// Verify a signed file or a detached signature
    Verify {
        /// Signed file, or the data for a detached signature
        file: PathBuf,
        /// Detached signature file
        #[arg(short, long)]
        signature: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the engine is reachable
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove orphaned staged files
    Sweep,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Key subcommands.
#[derive(Subcommand)]
pub enum KeysAction {
    /// Generate a new key pair
    Generate {
        /// Real name on the user ID (default: your account's full name)
        #[arg(short, long)]
        name: Option<String>,
        /// Email address on the user ID
        #[arg(short, long)]
        email: String,
        /// Key length in bits
        #[arg(short, long, default_value_t = constants::DEFAULT_KEY_LENGTH)]
        length: u32,
        /// Expire after this many days (0 = never)
        #[arg(long, default_value_t = 0)]
        expires_days: u32,
        /// Protect the private key with a passphrase
        #[arg(short = 'p', long)]
        ask_passphrase: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import keys from an armored or binary file
    Import {
        /// Key file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a key
    Export {
        /// Fingerprint or key ID
        id: String,
        /// Include the private key
        #[arg(long)]
        private: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Prompt for the private key passphrase
        #[arg(short = 'p', long)]
        ask_passphrase: bool,
    },

    /// List keys
    List {
        /// Only keys with a private half
        #[arg(long)]
        private: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one key
    Info {
        /// Fingerprint or key ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a key and its private half
    Delete {
        /// Full fingerprint
        fingerprint: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check a key file without importing it
    Validate {
        /// Key file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute a command.
pub fn execute(command: Command, config: Option<PathBuf>) -> Result<()> {
    if let Command::Completions { shell } = command {
        return completions::execute(shell);
    }

    let config = Config::load(config.as_deref())?;
    let app = Keysmith::open(&config)?;

    match command {
        Command::Keys { action } => match action {
            KeysAction::Generate {
                name,
                email,
                length,
                expires_days,
                ask_passphrase,
                json,
            } => keys::generate(
                &app,
                name,
                &email,
                length,
                expires_days,
                ask_passphrase,
                json,
            ),
            KeysAction::Import { file, json } => keys::import(&app, &file, json),
            KeysAction::Export {
                id,
                private,
                output,
                ask_passphrase,
            } => keys::export(&app, &id, private, output.as_deref(), ask_passphrase),
            KeysAction::List { private, json } => keys::list(&app, private, json),
            KeysAction::Info { id, json } => keys::info(&app, &id, json),
            KeysAction::Delete { fingerprint, yes } => keys::delete(&app, &fingerprint, yes),
            KeysAction::Validate { file, json } => keys::validate(&app, &file, json),
        },
        Command::Encrypt {
            file,
            recipients,
            output,
        } => cipher::encrypt(&app, &config, &file, &recipients, output),
        Command::Decrypt {
            file,
            output,
            ask_passphrase,
        } => cipher::decrypt(&app, &file, output, ask_passphrase),
        Command::Verify {
            file,
            signature,
            json,
        } => cipher::verify(&app, &file, signature.as_deref(), json),
        Command::Health { json } => health::execute(&app, json),
        Command::Sweep => health::sweep(&app),
        Command::Completions { .. } => Ok(()),
    }
}
