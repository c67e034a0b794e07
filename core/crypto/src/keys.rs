//! Key types with secure memory handling.
//!
//! The secret key zeroizes its memory on drop so passphrase-derived
//! material does not persist in memory.

use blake2::{Blake2b512, Digest};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use gitkv_common::{Error, Result};

/// Length of encryption keys in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Symmetric key derived from a user passphrase.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    key: [u8; KEY_LENGTH],
}

impl SecretKey {
    /// Create a secret key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// BLAKE2b-512 digest of a passphrase.
pub fn fingerprint(secret: &[u8]) -> [u8; 64] {
    let digest = Blake2b512::digest(secret);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Derive the cipher key from a passphrase.
///
/// The key is the passphrase fingerprint truncated to [`KEY_LENGTH`], so the
/// same passphrase always yields the same key.
///
/// # Errors
/// - Returns error if the passphrase is empty
pub fn derive_key(secret: &str) -> Result<SecretKey> {
    if secret.is_empty() {
        return Err(Error::InvalidInput("Secret cannot be empty".to_string()));
    }

    let mut digest = fingerprint(secret.as_bytes());
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&digest[..KEY_LENGTH]);
    digest.zeroize();

    Ok(SecretKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let key1 = derive_key("correct horse").unwrap();
        let key2 = derive_key("correct horse").unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_secret() {
        let key1 = derive_key("secret-1").unwrap();
        let key2 = derive_key("secret-2").unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_is_truncated_fingerprint() {
        let key = derive_key("abc").unwrap();
        assert_eq!(&key.as_bytes()[..], &fingerprint(b"abc")[..KEY_LENGTH]);
    }

    #[test]
    fn test_derive_key_empty_secret_fails() {
        assert!(matches!(derive_key(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = derive_key("hunter2").unwrap();
        assert_eq!(format!("{:?}", key), "SecretKey([REDACTED])");
    }
}
