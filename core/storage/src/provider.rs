//! Remote store trait definition.

use async_trait::async_trait;

use gitkv_common::{Binding, Record, Result};

/// Key-value capability set every backing provider implements.
///
/// Keys and values are opaque strings at this layer; callers that want
/// encryption transform them before they get here.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the provider name (e.g., "github.com", "memory").
    fn provider(&self) -> &str;

    /// Read the current value of `key`.
    ///
    /// # Postconditions
    /// - The key's version hash is cached for the next write or delete
    ///
    /// # Returns
    /// - The not-found sentinel if the key does not exist
    ///
    /// # Errors
    /// - `BadRequest` if the key resolves to a folder
    /// - Authentication, namespace and transport errors
    async fn get(&self, key: &str) -> Result<Record>;

    /// Create or overwrite `key`.
    ///
    /// A cached version hash is sent as precondition. A stale hash is
    /// refreshed and the write retried once.
    ///
    /// # Errors
    /// - `ConflictRetryExhausted` if the retry conflicts as well
    /// - Authentication, namespace and transport errors
    async fn set(&self, key: &str, value: &str) -> Result<Record>;

    /// Remove `key`.
    ///
    /// # Returns
    /// - The not-found sentinel if the key is already gone
    ///
    /// # Errors
    /// - `ConflictRetryExhausted` if the retry conflicts as well
    async fn delete(&self, key: &str) -> Result<Record>;

    /// Enumerate every item in the bound database.
    ///
    /// Caches the version hash of each listed item.
    async fn list(&self) -> Result<Vec<Record>>;

    /// Point the adapter at another repository.
    async fn set_host(&self, owner: &str, repo: &str);

    /// Switch the branch reads and commits go to.
    async fn set_branch(&self, branch: &str);

    /// Replace the access token.
    async fn set_token(&self, token: &str);

    /// Switch the database directory.
    async fn use_namespace(&self, database: &str);

    /// Snapshot of the current target.
    async fn binding(&self) -> Binding;
}
