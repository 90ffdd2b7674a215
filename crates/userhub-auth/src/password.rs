//! Salted PBKDF2 password storage

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;
use subtle::ConstantTimeEq;
use userhub_db::User;

/// Random bytes per salt, stored hex-encoded
pub const SALT_BYTES: usize = 16;
/// PBKDF2 iteration count
pub const PBKDF2_ROUNDS: u32 = 10_000;
/// Derived key length in bytes
pub const HASH_BYTES: usize = 512;

/// Generate a fresh hex-encoded salt
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the hex-encoded PBKDF2-HMAC-SHA512 hash of `password`
///
/// The salt is fed to the KDF as its hex text, not the decoded bytes.
pub fn derive_hash(password: &str, salt: &str) -> String {
    let mut out = vec![0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out);
    hex::encode(out)
}

/// Check `password` against a stored salt and hash in constant time
pub fn verify_hash(password: &str, salt: &str, expected: &str) -> bool {
    let derived = derive_hash(password, salt);
    derived.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Something that holds a salted password hash
pub trait CredentialStore {
    /// Replace the stored credentials with a fresh salt and hash of `plain`
    fn set_password(&mut self, plain: &str);

    /// Whether `plain` matches the stored credentials
    fn validate_password(&self, plain: &str) -> bool;
}

impl CredentialStore for User {
    fn set_password(&mut self, plain: &str) {
        let salt = generate_salt();
        self.hash = derive_hash(plain, &salt);
        self.salt = salt;
    }

    fn validate_password(&self, plain: &str) -> bool {
        if self.salt.is_empty() || self.hash.is_empty() {
            return false;
        }
        verify_hash(plain, &self.salt, &self.hash)
    }
}
