//! Test fixtures and constants.

pub const ALICE_NAME: &str = "Alice Example";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const BOB_NAME: &str = "Bob Example";
pub const BOB_EMAIL: &str = "bob@example.org";

/// Passphrase used for protected test keys.
pub const PASSPHRASE: &str = "correct-horse-battery";
pub const WRONG_PASSPHRASE: &str = "incorrect-donkey";

/// Plaintext used across cipher tests.
pub const PLAINTEXT: &[u8] = b"quarterly numbers: 42, 17, 99\n";

/// A fingerprint no keyring in these tests will ever hold.
pub const ABSENT_FINGERPRINT: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF";

/// Armor that looks like a key block but carries no parseable packets.
pub const GARBAGE_KEY_BLOCK: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nbm90IGEga2V5\n-----END PGP PUBLIC KEY BLOCK-----\n";

/// Plain text with no armor at all.
pub const NOT_A_KEY: &str = "this is not key material\n";
