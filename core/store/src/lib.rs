//! Key-value store facade for gitkv.
//!
//! Wraps a [`gitkv_storage::RemoteStore`] with a read cache and optional
//! transparent encryption of key names and values. Callers only ever see
//! plaintext.

pub mod cache;
pub mod config;
pub mod store;

pub use cache::ReadCache;
pub use config::StoreConfig;
pub use store::KeyValueStore;
