//! Contents protocol: per-path versioned file operations.
//!
//! These are the wire shapes of a GitHub-style contents API. Content travels
//! base64 encoded; writes carry the blob `sha` they expect to replace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use gitkv_common::{Binding, Committer, Result};

/// One file (or directory entry) as reported by the contents API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    /// `file`, `dir`, `symlink` or `submodule`.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Encoded content; only present on single-item reads.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Body of a create, update or delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Blob hash being replaced; absent on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    pub branch: String,
    pub committer: Committer,
}

/// Commit produced by a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    #[serde(default)]
    pub sha: String,
}

/// Response to a create, update or delete request.
///
/// `content` is null after a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub content: Option<ContentItem>,
    #[serde(default)]
    pub commit: CommitInfo,
}

/// Raw per-path operations of one hosting provider.
///
/// Implementations map the provider's responses onto the common error
/// taxonomy: a keyed miss is `NotFound`, a keyless miss `NamespaceNotFound`,
/// a stale or missing precondition `VersionConflict`.
#[async_trait]
pub trait ContentsApi: Send + Sync {
    /// Provider name used for registry lookup.
    fn provider(&self) -> &str;

    /// Fetch one item with its content.
    async fn get_item(&self, binding: &Binding, key: &str) -> Result<ContentItem>;

    /// List the items of the bound database directory.
    async fn list_items(&self, binding: &Binding) -> Result<Vec<ContentItem>>;

    /// Create or update one item.
    async fn put_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse>;

    /// Delete one item.
    async fn delete_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse>;
}

#[async_trait]
impl<T: ContentsApi + ?Sized> ContentsApi for Arc<T> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    async fn get_item(&self, binding: &Binding, key: &str) -> Result<ContentItem> {
        (**self).get_item(binding, key).await
    }

    async fn list_items(&self, binding: &Binding) -> Result<Vec<ContentItem>> {
        (**self).list_items(binding).await
    }

    async fn put_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        (**self).put_item(binding, key, request).await
    }

    async fn delete_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        (**self).delete_item(binding, key, request).await
    }
}
