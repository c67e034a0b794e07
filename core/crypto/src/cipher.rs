//! AES-256-CBC encryption with hex transport encoding.
//!
//! Ciphertext layout is `hex(iv || cbc(pkcs7(plaintext)))`. PKCS#7 is the
//! byte-count padding scheme: every pad byte holds the number of pad bytes,
//! and a full block of padding is added when the plaintext is already aligned.

use aes::Aes256;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::keys::SecretKey;
use gitkv_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size, which is also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// How the initialization vector is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvMode {
    /// Fresh random IV per call. Equal plaintexts give different ciphertexts.
    Random,
    /// IV derived from the key and plaintext. Equal plaintexts give equal
    /// ciphertexts; distinct plaintexts get distinct IVs.
    Synthetic,
}

fn synthetic_iv(key: &SecretKey, plaintext: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(key.as_bytes());
    hasher.update(b"gitkv-siv");
    hasher.update(plaintext);

    let digest = hasher.finalize();
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&digest[..BLOCK_SIZE]);
    iv
}

/// Encrypt `plaintext` and return the hex encoded IV and ciphertext.
///
/// # Postconditions
/// - Output decodes to `BLOCK_SIZE + n * BLOCK_SIZE` bytes, `n >= 1`
///
/// # Errors
/// - Returns error if the cipher cannot be initialized
pub fn encrypt(key: &SecretKey, plaintext: &[u8], mode: IvMode) -> Result<String> {
    let iv = match mode {
        IvMode::Random => rand::random::<[u8; BLOCK_SIZE]>(),
        IvMode::Synthetic => synthetic_iv(key, plaintext),
    };

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| Error::Crypto(format!("Invalid key or IV: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

/// Decrypt hex produced by [`encrypt`].
///
/// # Errors
/// - Input is not valid hex
/// - Input is shorter than one IV plus one block, or not block aligned
/// - Padding is invalid (typically a wrong key)
pub fn decrypt(key: &SecretKey, ciphertext_hex: &str) -> Result<Vec<u8>> {
    let data = hex::decode(ciphertext_hex.trim())
        .map_err(|e| Error::Crypto(format!("Ciphertext is not valid hex: {}", e)))?;

    if data.len() < 2 * BLOCK_SIZE || data.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto(format!(
            "Ciphertext has invalid length {}",
            data.len()
        )));
    }

    let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| Error::Crypto(format!("Invalid key or IV: {}", e)))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Crypto("Decryption failed: invalid padding".to_string()))
}

/// Encrypt a UTF-8 string.
pub fn encrypt_str(key: &SecretKey, plaintext: &str, mode: IvMode) -> Result<String> {
    encrypt(key, plaintext.as_bytes(), mode)
}

/// Decrypt to a UTF-8 string.
pub fn decrypt_str(key: &SecretKey, ciphertext_hex: &str) -> Result<String> {
    let bytes = decrypt(key, ciphertext_hex)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Crypto(format!("Decrypted data is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_key, KEY_LENGTH};
    use proptest::prelude::*;

    fn key() -> SecretKey {
        SecretKey::from_bytes([42u8; KEY_LENGTH])
    }

    #[test]
    fn test_roundtrip_boundary_lengths() {
        let key = key();
        for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 3 * BLOCK_SIZE] {
            let plaintext = vec![0x5Au8; len];
            for mode in [IvMode::Random, IvMode::Synthetic] {
                let ciphertext = encrypt(&key, &plaintext, mode).unwrap();
                assert_eq!(decrypt(&key, &ciphertext).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_ciphertext_size_includes_full_pad_block() {
        let key = key();

        let aligned = encrypt(&key, &[0u8; BLOCK_SIZE], IvMode::Random).unwrap();
        assert_eq!(hex::decode(aligned).unwrap().len(), 3 * BLOCK_SIZE);

        let empty = encrypt(&key, b"", IvMode::Random).unwrap();
        assert_eq!(hex::decode(empty).unwrap().len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn test_random_iv_differs() {
        let key = key();
        let ct1 = encrypt(&key, b"same", IvMode::Random).unwrap();
        let ct2 = encrypt(&key, b"same", IvMode::Random).unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_synthetic_iv_is_deterministic() {
        let key = key();
        let ct1 = encrypt(&key, b"user:42", IvMode::Synthetic).unwrap();
        let ct2 = encrypt(&key, b"user:42", IvMode::Synthetic).unwrap();
        let other = encrypt(&key, b"user:43", IvMode::Synthetic).unwrap();

        assert_eq!(ct1, ct2);
        assert_ne!(ct1[..2 * BLOCK_SIZE], other[..2 * BLOCK_SIZE]);
    }

    #[test]
    fn test_output_is_lowercase_hex() {
        let ct = encrypt(&key(), b"value", IvMode::Random).unwrap();
        assert!(ct.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let key1 = derive_key("one").unwrap();
        let key2 = derive_key("two").unwrap();
        let plaintext = b"Secret data that spans blocks";

        let ct = encrypt(&key1, plaintext, IvMode::Random).unwrap();
        match decrypt(&key2, &ct) {
            Ok(bytes) => assert_ne!(bytes, plaintext),
            Err(e) => assert!(matches!(e, Error::Crypto(_))),
        }
    }

    #[test]
    fn test_malformed_input() {
        let key = key();
        assert!(matches!(decrypt(&key, "zz"), Err(Error::Crypto(_))));
        assert!(matches!(decrypt(&key, "00"), Err(Error::Crypto(_))));
        assert!(matches!(decrypt(&key, &"ab".repeat(40)), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_str_helpers() {
        let key = key();
        let ct = encrypt_str(&key, "héllo wörld", IvMode::Random).unwrap();
        assert_eq!(decrypt_str(&key, &ct).unwrap(), "héllo wörld");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let key = key();
            let ct = encrypt(&key, &data, IvMode::Random).unwrap();
            prop_assert_eq!(decrypt(&key, &ct).unwrap(), data);
        }
    }
}
