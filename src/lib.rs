//! Keysmith - OpenPGP keyring and file cipher service.
//!
//! Owns a GnuPG keyring, mediates every cryptographic operation against it,
//! and guarantees that no staged file outlives the request that created it.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── keys          # generate/import/export/list/info/delete/validate
//! │   ├── cipher        # encrypt/decrypt/verify
//! │   ├── health        # health probe and staging sweep
//! │   ├── prompt        # passphrase and confirmation prompts
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── config        # config.toml management
//!     ├── domain/       # Key records, jobs, passphrases, uploads
//!     ├── engine/       # Engine trait and GnuPG subprocess client
//!     │   ├── process   # Bounded subprocess execution
//!     │   ├── colons    # Key listing parser
//!     │   └── status    # Status line parser
//!     ├── keyring       # Keyring directory setup
//!     ├── keys          # Key lifecycle service
//!     ├── cipher        # Cipher job service
//!     ├── staging       # Temporary file lifecycle
//!     ├── limiter       # Concurrency bound for cipher jobs
//!     └── service       # Wiring and health
//! ```
//!
//! # Concurrency
//!
//! Keyring mutations are serialized behind one lock; reads and cipher jobs
//! share it. Cipher jobs are additionally bounded by a permit count. Every
//! engine call runs under a timeout and is killed when it expires.
//!
//! # Example
//!
//! ```no_run
//! use keysmith::core::config::Config;
//! use keysmith::core::domain::Upload;
//! use keysmith::core::service::Keysmith;
//!
//! # fn main() -> keysmith::error::Result<()> {
//! let app = Keysmith::open(&Config::load(None)?)?;
//! let key = app.keys().generate_key_pair("Alice", "alice@example.com", 3072, None)?;
//!
//! let upload = Upload::new(b"hello".to_vec());
//! let outcome = app.cipher().encrypt_file(&upload, &[key.fingerprint().clone()])?;
//! let ciphertext = outcome.read_output()?;
//! # let _ = ciphertext;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;
