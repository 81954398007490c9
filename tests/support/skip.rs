/// Skip a test if no GnuPG binary answers `--version`.
#[macro_export]
macro_rules! skip_without_gpg {
    () => {
        if !$crate::support::skip::gpg_available() {
            eprintln!("SKIPPED: gpg not found on PATH");
            return;
        }
    };
}

pub fn gpg_available() -> bool {
    std::process::Command::new("gpg")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
