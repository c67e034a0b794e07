//! Client-side encryption for gitkv.
//!
//! This module provides:
//! - Key derivation from a passphrase by one-way hashing (BLAKE2b)
//! - AES-256-CBC encryption with byte-count (PKCS#7) padding, hex encoded
//! - Secure key handling with automatic zeroization
//!
//! # IV handling
//! Values are encrypted under a fresh random IV. Key names need a stable
//! ciphertext so the same plaintext key always addresses the same remote
//! file; they use a synthetic IV derived from the key and the plaintext.
//! The IV is stored in front of the ciphertext in both modes.

pub mod cipher;
pub mod keys;

pub use cipher::{decrypt, decrypt_str, encrypt, encrypt_str, IvMode, BLOCK_SIZE};
pub use keys::{derive_key, fingerprint, SecretKey, KEY_LENGTH};
