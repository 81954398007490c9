//! Test support utilities for keysmith integration tests.
//!
//! Provides isolated keyring/staging directories, a scripted in-memory
//! engine, and helpers for driving the binary.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;
pub mod mock_engine;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_engine::MockEngine;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keysmith::core::config::Config;
use keysmith::core::keyring::Keyring;
use keysmith::core::service::Keysmith;
use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own working dir and home dir. No process-global state
/// is mutated, so tests can run in parallel.
pub struct Test {
    /// Working directory for input and output files
    pub dir: TempDir,
    /// Home directory holding keyring, staging and config
    pub home: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        Self { dir, home }
    }

    /// Config rooted in this test's home directory.
    pub fn config(&self) -> Config {
        let mut config = Config::with_base_dir(self.home.path());
        config.engine.timeout_secs = 60;
        config
    }

    /// Service wired to a fresh mock engine.
    pub fn mock(&self) -> (Keysmith, Arc<MockEngine>) {
        self.mock_with(self.config())
    }

    /// Service wired to a fresh mock engine, with a custom config.
    pub fn mock_with(&self, config: Config) -> (Keysmith, Arc<MockEngine>) {
        let keyring = Keyring::open(&config.keyring.dir).expect("failed to open keyring");
        let engine = Arc::new(MockEngine::new());
        let app = Keysmith::with_engine(&config, keyring, engine.clone())
            .expect("failed to build service");
        (app, engine)
    }

    /// Service backed by the real GnuPG binary.
    pub fn gpg(&self) -> Keysmith {
        Keysmith::open(&self.config()).expect("failed to open service")
    }

    /// Staging directory of this test's config.
    pub fn staging_dir(&self) -> PathBuf {
        self.config().staging.dir
    }

    /// Files currently in the staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.staging_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Write a file into the working directory and return its path.
    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("failed to write test file");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `config.toml` into the home directory and return its path.
    pub fn write_config(&self, config: &Config) -> PathBuf {
        let path = self.home.path().join("config.toml");
        fs::write(&path, config.to_toml().expect("config serializes"))
            .expect("failed to write config");
        path
    }
}

/// Whether `path` exists and is non-empty.
pub fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
