//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use keysmith::core::constants;
use std::path::Path;
use std::process::Output;

impl Test {
    /// Create a keysmith command isolated to this test.
    ///
    /// Returns a Command configured with:
    /// - HOME set to the temporary home directory
    /// - Current directory set to the test working directory
    /// - No inherited passphrase or config override
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("keysmith").expect("failed to find keysmith binary");
        cmd.env("HOME", self.home.path());
        // Windows uses USERPROFILE instead of HOME for home directory
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove(constants::PASSPHRASE_ENV);
        cmd.env_remove(constants::CONFIG_ENV);
        cmd.env_remove(constants::LOG_ENV);
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Command reading an explicit config file.
    pub fn cmd_with_config(&self, config: &Path) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--config").arg(config);
        cmd
    }

    /// Shortcut for `keysmith health`.
    pub fn health(&self) -> Output {
        self.cmd()
            .arg("health")
            .output()
            .expect("failed to run keysmith health")
    }

    /// Shortcut for `keysmith keys list`.
    pub fn keys_list(&self) -> Output {
        self.cmd()
            .args(["keys", "list"])
            .output()
            .expect("failed to run keysmith keys list")
    }

    /// Shortcut for `keysmith keys list --json`.
    pub fn keys_list_json(&self) -> Output {
        self.cmd()
            .args(["keys", "list", "--json"])
            .output()
            .expect("failed to run keysmith keys list --json")
    }

    /// Shortcut for `keysmith keys validate`.
    pub fn keys_validate(&self, file: &Path) -> Output {
        self.cmd()
            .args(["keys", "validate"])
            .arg(file)
            .output()
            .expect("failed to run keysmith keys validate")
    }

    /// Shortcut for `keysmith keys generate` without a passphrase.
    pub fn keys_generate(&self, name: &str, email: &str) -> Output {
        self.cmd()
            .args(["keys", "generate", "--name", name, "--email", email, "--json"])
            .output()
            .expect("failed to run keysmith keys generate")
    }

    /// Shortcut for `keysmith encrypt`.
    pub fn encrypt(&self, file: &Path, recipients: &[&str]) -> Output {
        let mut cmd = self.cmd();
        cmd.arg("encrypt").arg(file);
        for r in recipients {
            cmd.args(["--recipient", r]);
        }
        cmd.output().expect("failed to run keysmith encrypt")
    }

    /// Shortcut for `keysmith decrypt`.
    pub fn decrypt(&self, file: &Path, output: &Path) -> Output {
        self.cmd()
            .arg("decrypt")
            .arg(file)
            .arg("--output")
            .arg(output)
            .output()
            .expect("failed to run keysmith decrypt")
    }
}
