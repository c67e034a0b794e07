//! Common utilities and types shared across gitkv crates.
//!
//! This module provides the error taxonomy, the record returned for every key,
//! the namespace binding that scopes an adapter, and host string parsing.

pub mod error;
pub mod host;
pub mod types;

pub use error::{Error, Result};
pub use host::HostLocator;
pub use types::{Binding, Committer, Record};
