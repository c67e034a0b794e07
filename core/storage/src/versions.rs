//! Version hash bookkeeping for optimistic concurrency.

use std::collections::HashMap;

use gitkv_common::{Binding, Error, Result};

/// How many times one write may refresh its version hash and re-issue.
pub const MAX_CONFLICT_RETRIES: u32 = 1;

/// Last observed blob hash per key.
///
/// An entry is the precondition token for the next write or delete of its
/// key. Entries are scoped by [`Binding::location`], so re-targeting an
/// adapter never reuses a hash seen in another repository, branch or
/// database.
#[derive(Debug, Default)]
pub struct VersionCache {
    entries: HashMap<String, String>,
}

impl VersionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash to send as precondition for `key`, if one was observed.
    pub fn get(&self, binding: &Binding, key: &str) -> Option<String> {
        self.entries.get(&binding.location(key)).cloned()
    }

    /// Remember the current hash of `key`. Empty hashes are ignored.
    pub fn record(&mut self, binding: &Binding, key: &str, sha: &str) {
        if sha.is_empty() {
            return;
        }
        self.entries.insert(binding.location(key), sha.to_string());
    }

    /// Drop the entry for `key` after it was deleted or found missing.
    pub fn forget(&mut self, binding: &Binding, key: &str) {
        self.entries.remove(&binding.location(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Conflict retry budget of a single write call.
///
/// Created when a `set`/`delete` starts and dropped when it returns, so the
/// budget never outlives the call.
#[derive(Debug)]
pub struct RetryGuard<'a> {
    key: &'a str,
    attempts: u32,
}

impl<'a> RetryGuard<'a> {
    pub fn new(key: &'a str) -> Self {
        Self { key, attempts: 0 }
    }

    /// Claim a retry after a version conflict.
    ///
    /// # Errors
    /// - `ConflictRetryExhausted` once [`MAX_CONFLICT_RETRIES`] is spent
    pub fn retry(&mut self, message: String) -> Result<()> {
        if self.attempts >= MAX_CONFLICT_RETRIES {
            return Err(Error::ConflictRetryExhausted {
                key: self.key.to_string(),
                message,
            });
        }
        self.attempts += 1;
        Ok(())
    }

    /// Retries claimed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
