//! Remote store adapters for gitkv.
//!
//! This module provides a trait-based interface over versioned file hosting
//! services (a "contents API" with per-path read/write/delete and commit
//! versioning) and a registry that resolves a parsed host to an adapter.
//!
//! # Design Principles
//! - Provider isolation: each provider only speaks its wire protocol through
//!   [`ContentsApi`]; versioning and retry live once in [`ContentsStore`]
//! - Optimistic concurrency: every overwrite or delete carries the last seen
//!   blob hash, and a stale hash is refreshed and retried exactly once
//! - No plaintext handling: encryption happens above this layer

pub mod adapter;
pub mod contents;
pub mod github;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod versions;

pub use adapter::{ContentsStore, MAX_KEY_NAME_BYTES};
pub use contents::{CommitInfo, ContentItem, ContentsApi, WriteRequest, WriteResponse};
pub use github::{create_github_store, GitHubClient, GitHubConfig, GitHubStore, GITHUB_API_BASE};
pub use memory::{create_memory_store, CallCounts, MemoryContents, MemoryStore};
pub use provider::RemoteStore;
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
pub use versions::{RetryGuard, VersionCache, MAX_CONFLICT_RETRIES};
