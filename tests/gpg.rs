//! End-to-end tests against a real GnuPG installation.
//!
//! Each test gets its own keyring. Tests skip when `gpg` is not installed.

mod support;

use std::process::Command;

use keysmith::core::domain::{Passphrase, Upload, Verification};
use keysmith::error::{CipherError, DecryptFailure, Error, ErrorKind};
use support::*;

fn passphrase(secret: &str) -> Option<Passphrase> {
    Some(Passphrase::new(secret).unwrap())
}

/// Make a detached signature with the gpg binary directly.
fn detach_sign(t: &Test, signer: &str, data: &std::path::Path) -> std::path::PathBuf {
    let sig = t.path("data.sig");
    let status = Command::new("gpg")
        .arg("--homedir")
        .arg(&t.config().keyring.dir)
        .args(["--batch", "--yes", "--pinentry-mode", "loopback", "--passphrase", ""])
        .args(["--local-user", signer, "--output"])
        .arg(&sig)
        .arg("--detach-sign")
        .arg(data)
        .status()
        .expect("failed to run gpg");
    assert!(status.success(), "gpg --detach-sign failed");
    sig
}

#[test]
fn test_health_reports_engine_version() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();

    let health = app.health();
    assert!(health.is_live());
    assert_eq!(health.engine, "gnupg");
    assert!(health.engine_version.unwrap().contains("GnuPG"));
}

#[test]
fn test_empty_keyring_lists_nothing() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();

    assert!(app.keys().list_keys(false).unwrap().is_empty());
    assert!(app.keys().list_keys(true).unwrap().is_empty());
}

#[test]
fn test_generate_export_import_roundtrip() {
    skip_without_gpg!();
    let source = Test::new();
    let source_app = source.gpg();

    let key = source_app
        .keys()
        .generate_key_pair(ALICE_NAME, ALICE_EMAIL, 2048, passphrase(PASSPHRASE))
        .unwrap();
    assert!(key.has_private_component());
    assert_eq!(key.key_length_bits(), 2048);
    assert!(key.can_encrypt());

    let public = source_app
        .keys()
        .export_key(key.fingerprint().as_str(), false, None)
        .unwrap();
    assert!(String::from_utf8_lossy(&public).contains("BEGIN PGP PUBLIC KEY BLOCK"));

    let target = Test::new();
    let target_app = target.gpg();
    let format = target_app.keys().validate_key_format(&public).unwrap();
    assert!(format.is_well_formed());
    assert!(target_app.keys().list_keys(false).unwrap().is_empty());

    let imported = target_app.keys().import_key(&public).unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].fingerprint(), key.fingerprint());
    assert!(!imported[0].has_private_component());

    // Second import changes nothing.
    let again = target_app.keys().import_key(&public).unwrap();
    assert_eq!(again[0].fingerprint(), key.fingerprint());
    assert_eq!(target_app.keys().list_keys(false).unwrap().len(), 1);
}

#[test]
fn test_protected_keys_generate_reliably() {
    skip_without_gpg!();
    for _ in 0..5 {
        let t = Test::new();
        let app = t.gpg();

        let key = app
            .keys()
            .generate_key_pair(ALICE_NAME, ALICE_EMAIL, 2048, passphrase(PASSPHRASE))
            .unwrap();
        let fpr = key.fingerprint().as_str();

        let keys = app.keys().list_keys(false).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].has_private_component());

        // The key is protected by the supplied passphrase, not left open.
        assert_kind(
            app.keys().export_key(fpr, true, passphrase(WRONG_PASSPHRASE)),
            ErrorKind::PrivateKeyUnavailable,
        );
        assert!(app.keys().export_key(fpr, true, passphrase(PASSPHRASE)).is_ok());
    }
}

#[test]
fn test_repeated_generation_in_one_keyring() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();

    for _ in 0..3 {
        app.keys()
            .generate_key_pair(BOB_NAME, BOB_EMAIL, 2048, passphrase(PASSPHRASE))
            .unwrap();
    }
    assert_eq!(app.keys().list_keys(true).unwrap().len(), 3);
    let scratch = t.config().keyring.dir.join("keygen");
    assert_eq!(std::fs::read_dir(scratch).unwrap().count(), 0);
}

#[test]
fn test_private_export_requires_passphrase() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();
    let key = app
        .keys()
        .generate_key_pair(ALICE_NAME, ALICE_EMAIL, 2048, passphrase(PASSPHRASE))
        .unwrap();
    let fpr = key.fingerprint().as_str();

    assert_kind(
        app.keys().export_key(fpr, true, passphrase(WRONG_PASSPHRASE)),
        ErrorKind::PrivateKeyUnavailable,
    );

    let secret = app.keys().export_key(fpr, true, passphrase(PASSPHRASE)).unwrap();
    assert!(String::from_utf8_lossy(&secret).contains("BEGIN PGP PRIVATE KEY BLOCK"));
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();
    let key = app
        .keys()
        .generate_key_pair(ALICE_NAME, ALICE_EMAIL, 2048, passphrase(PASSPHRASE))
        .unwrap();

    let ciphertext = app
        .cipher()
        .encrypt_file(&Upload::new(PLAINTEXT), &[key.fingerprint().clone()])
        .unwrap()
        .read_output()
        .unwrap();
    assert!(String::from_utf8_lossy(&ciphertext).contains("BEGIN PGP MESSAGE"));

    let plaintext = app
        .cipher()
        .decrypt_file(&Upload::new(ciphertext.clone()), passphrase(PASSPHRASE))
        .unwrap()
        .read_output()
        .unwrap();
    assert_eq!(plaintext, PLAINTEXT);

    let wrong = app
        .cipher()
        .decrypt_file(&Upload::new(ciphertext), passphrase(WRONG_PASSPHRASE));
    assert!(matches!(
        wrong,
        Err(Error::Cipher(CipherError::DecryptionFailed(
            DecryptFailure::BadPassphrase
        )))
    ));
    assert!(t.staged_files().is_empty());
}

#[test]
fn test_decrypt_garbage_is_corrupt_input() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();

    let result = app
        .cipher()
        .decrypt_file(&Upload::new(b"no openpgp here".to_vec()), None);
    assert!(matches!(
        result,
        Err(Error::Cipher(CipherError::DecryptionFailed(
            DecryptFailure::CorruptInput
        )))
    ));
}

#[test]
fn test_import_garbage_leaves_keyring_untouched() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();

    assert_kind(
        app.keys().import_key(GARBAGE_KEY_BLOCK.as_bytes()),
        ErrorKind::MalformedKeyData,
    );
    assert!(app.keys().list_keys(false).unwrap().is_empty());
}

#[test]
fn test_delete_then_lookup() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();
    let key = app
        .keys()
        .generate_key_pair(BOB_NAME, BOB_EMAIL, 2048, None)
        .unwrap();
    let fpr = key.fingerprint().as_str();

    app.keys().delete_key(fpr).unwrap();

    assert_kind(app.keys().get_key_info(fpr), ErrorKind::KeyNotFound);
    assert_kind(app.keys().delete_key(fpr), ErrorKind::KeyNotFound);
}

#[test]
fn test_verify_detached_signature() {
    skip_without_gpg!();
    let t = Test::new();
    let app = t.gpg();
    let key = app
        .keys()
        .generate_key_pair(BOB_NAME, BOB_EMAIL, 2048, None)
        .unwrap();
    let data = t.write("data.txt", PLAINTEXT);
    let sig = detach_sign(&t, key.fingerprint().as_str(), &data);

    let signature = Upload::from_path(&sig).unwrap();
    let outcome = app
        .cipher()
        .verify_file(&Upload::new(PLAINTEXT), Some(&signature))
        .unwrap();
    assert_eq!(
        outcome.verification,
        Verification::Valid {
            fingerprint: key.fingerprint().clone()
        }
    );

    let tampered = app
        .cipher()
        .verify_file(&Upload::new(b"tampered".to_vec()), Some(&signature))
        .unwrap();
    assert!(matches!(tampered.verification, Verification::Bad { .. }));
}
