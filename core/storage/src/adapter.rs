//! Versioned key-value adapter over a contents API.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use gitkv_common::{Binding, Error, Record, Result};

use crate::contents::{ContentItem, ContentsApi, WriteRequest, WriteResponse};
use crate::provider::RemoteStore;
use crate::versions::{RetryGuard, VersionCache};

/// [`RemoteStore`] implementation shared by every contents-API provider.
///
/// Owns the namespace binding and the version cache, encodes values as
/// base64, and runs the bounded conflict retry for writes and deletes.
pub struct ContentsStore<A> {
    api: A,
    binding: RwLock<Binding>,
    versions: Mutex<VersionCache>,
}

impl<A: ContentsApi> ContentsStore<A> {
    /// Create an adapter bound to `binding`.
    pub fn new(api: A, binding: Binding) -> Self {
        Self {
            api,
            binding: RwLock::new(binding),
            versions: Mutex::new(VersionCache::new()),
        }
    }

    /// Underlying protocol client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Cached precondition hash for `key` under the current binding.
    pub async fn cached_version(&self, key: &str) -> Option<String> {
        let binding = self.binding.read().await;
        self.versions.lock().await.get(&binding, key)
    }

    /// Read `key` and refresh its cached hash.
    async fn fetch(&self, binding: &Binding, key: &str) -> Result<Record> {
        debug!(key = %key, namespace = %binding, "Fetching key");

        match self.api.get_item(binding, key).await {
            Ok(item) => {
                let content = decode_content(&item)?;
                self.versions.lock().await.record(binding, key, &item.sha);
                Ok(record_from_item(item, content))
            }
            Err(Error::NotFound(_)) => {
                self.versions.lock().await.forget(binding, key);
                Ok(Record::not_found())
            }
            Err(e) => Err(e),
        }
    }

    fn write_request(
        binding: &Binding,
        message: String,
        content: Option<String>,
        sha: Option<String>,
    ) -> WriteRequest {
        WriteRequest {
            message,
            content,
            sha,
            branch: binding.branch.clone(),
            committer: binding.committer.clone(),
        }
    }
}

/// Longest file name the contents API accepts, in bytes.
pub const MAX_KEY_NAME_BYTES: usize = 255;

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_NAME_BYTES {
        return Err(Error::InvalidInput(format!(
            "Key name is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_NAME_BYTES
        )));
    }
    if key.contains('/') {
        return Err(Error::InvalidInput(format!(
            "Key \"{}\" cannot contain '/'",
            key
        )));
    }
    Ok(())
}

/// Decode item content. GitHub wraps base64 at 60 columns, so whitespace
/// is dropped before decoding.
fn decode_content(item: &ContentItem) -> Result<String> {
    match item.encoding.as_deref() {
        None | Some("") | Some("base64") => {}
        Some(other) => {
            return Err(Error::Serialization(format!(
                "Unsupported content encoding \"{}\" for {}",
                other, item.name
            )));
        }
    }

    let compact: String = item
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| Error::Serialization(format!("Invalid base64 content: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| Error::Serialization(format!("Content is not UTF-8: {}", e)))
}

fn record_from_item(item: ContentItem, content: String) -> Record {
    Record {
        content,
        name: item.name,
        size: item.size,
        raw_url: item.download_url.unwrap_or_default(),
        html_url: item.html_url.unwrap_or_default(),
        commit: String::new(),
        sha: item.sha,
    }
}

/// The remote does not echo content on writes; the record carries
/// provenance only.
fn record_from_write(response: WriteResponse, key: &str) -> Record {
    let commit = response.commit.sha;
    match response.content {
        Some(item) => {
            let mut record = record_from_item(item, String::new());
            if record.name.is_empty() {
                record.name = key.to_string();
            }
            record.commit = commit;
            record
        }
        None => Record {
            name: key.to_string(),
            commit,
            ..Record::default()
        },
    }
}

#[async_trait]
impl<A: ContentsApi> RemoteStore for ContentsStore<A> {
    fn provider(&self) -> &str {
        self.api.provider()
    }

    async fn get(&self, key: &str) -> Result<Record> {
        validate_key(key)?;
        let binding = self.binding.read().await.clone();
        self.fetch(&binding, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<Record> {
        validate_key(key)?;
        let binding = self.binding.read().await.clone();
        let content = STANDARD.encode(value);
        let mut guard = RetryGuard::new(key);

        loop {
            let sha = self.versions.lock().await.get(&binding, key);
            let message = match sha {
                Some(_) => format!("gitkv update key {}", key),
                None => format!("gitkv create key {}", key),
            };
            let request = Self::write_request(&binding, message, Some(content.clone()), sha);

            match self.api.put_item(&binding, key, &request).await {
                Ok(response) => {
                    let record = record_from_write(response, key);
                    self.versions.lock().await.record(&binding, key, &record.sha);
                    info!(key = %key, commit = %record.commit, retries = guard.attempts(), "Key written");
                    return Ok(record);
                }
                Err(Error::VersionConflict(message)) => {
                    guard.retry(message)?;
                    warn!(key = %key, "Version conflict on write, refreshing version");
                    self.fetch(&binding, key).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<Record> {
        validate_key(key)?;
        let binding = self.binding.read().await.clone();
        let mut guard = RetryGuard::new(key);

        loop {
            let sha = self.versions.lock().await.get(&binding, key);
            let request =
                Self::write_request(&binding, format!("gitkv delete key {}", key), None, sha);

            match self.api.delete_item(&binding, key, &request).await {
                Ok(response) => {
                    self.versions.lock().await.forget(&binding, key);
                    let record = record_from_write(response, key);
                    info!(key = %key, commit = %record.commit, retries = guard.attempts(), "Key deleted");
                    return Ok(record);
                }
                Err(Error::NotFound(_)) => {
                    self.versions.lock().await.forget(&binding, key);
                    debug!(key = %key, "Key already absent");
                    return Ok(Record::not_found());
                }
                Err(Error::VersionConflict(message)) => {
                    guard.retry(message)?;
                    warn!(key = %key, "Version conflict on delete, refreshing version");
                    if self.fetch(&binding, key).await?.is_not_found() {
                        debug!(key = %key, "Key vanished before delete");
                        return Ok(Record::not_found());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list(&self) -> Result<Vec<Record>> {
        let binding = self.binding.read().await.clone();
        debug!(namespace = %binding, "Listing keys");

        let items = self.api.list_items(&binding).await?;
        let mut versions = self.versions.lock().await;

        Ok(items
            .into_iter()
            .map(|item| {
                versions.record(&binding, &item.name, &item.sha);
                record_from_item(item, String::new())
            })
            .collect())
    }

    async fn set_host(&self, owner: &str, repo: &str) {
        let mut binding = self.binding.write().await;
        binding.owner = owner.to_string();
        binding.repo = repo.to_string();
    }

    async fn set_branch(&self, branch: &str) {
        self.binding.write().await.branch = branch.to_string();
    }

    async fn set_token(&self, token: &str) {
        self.binding.write().await.token = Some(token.to_string());
    }

    async fn use_namespace(&self, database: &str) {
        self.binding.write().await.database = database.to_string();
    }

    async fn binding(&self) -> Binding {
        self.binding.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CallCounts, MemoryContents, MemoryStore};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryContents>, MemoryStore) {
        let contents = Arc::new(MemoryContents::new());
        let store = ContentsStore::new(contents.clone(), Binding::new("owner", "repo"));
        (contents, store)
    }

    #[tokio::test]
    async fn test_get_missing_is_sentinel() {
        let (_, store) = store();
        let record = store.get("never-written").await.unwrap();
        assert!(record.is_not_found());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrips_through_base64() {
        let (_, store) = store();
        let value = "multi\nline ✓ value with padding?";

        let written = store.set("k", value).await.unwrap();
        assert_eq!(written.name, "k");
        assert!(written.content.is_empty());
        assert!(!written.commit.is_empty());
        assert_eq!(store.cached_version("k").await, Some(written.sha.clone()));

        let read = store.get("k").await.unwrap();
        assert_eq!(read.content, value);
        assert_eq!(read.sha, written.sha);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_sentinel() {
        let (_, store) = store();
        store.set("empty", "").await.unwrap();

        let record = store.get("empty").await.unwrap();
        assert!(!record.is_not_found());
        assert_eq!(record.content, "");
    }

    #[tokio::test]
    async fn test_overwrite_sends_cached_sha() {
        let (contents, store) = store();
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().content, "two");
        assert_eq!(
            contents.calls(),
            CallCounts { get: 1, list: 0, put: 2, delete: 0 }
        );
    }

    #[tokio::test]
    async fn test_stale_sha_refreshes_once_and_succeeds() {
        let (contents, store) = store();
        let binding = store.binding().await;
        store.set("k", "mine").await.unwrap();
        contents.write_externally(&binding, "k", "theirs").await;
        let before = contents.calls();

        store.set("k", "mine again").await.unwrap();

        let after = contents.calls();
        assert_eq!(after.get - before.get, 1);
        assert_eq!(after.put - before.put, 2);
        assert_eq!(store.get("k").await.unwrap().content, "mine again");
    }

    #[tokio::test]
    async fn test_cold_cache_overwrite_refreshes_once() {
        let (contents, store) = store();
        let binding = store.binding().await;
        contents.write_externally(&binding, "k", "seeded").await;

        store.set("k", "replaced").await.unwrap();

        assert_eq!(contents.calls(), CallCounts { get: 1, list: 0, put: 2, delete: 0 });
    }

    #[tokio::test]
    async fn test_second_conflict_exhausts_retry() {
        let (contents, store) = store();
        store.set("k", "v").await.unwrap();
        contents.inject_conflicts("k", 2).await;
        let before = contents.calls();

        match store.set("k", "w").await {
            Err(Error::ConflictRetryExhausted { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected ConflictRetryExhausted, got {:?}", other),
        }

        let after = contents.calls();
        assert_eq!(after.put - before.put, 2);
        assert_eq!(after.get - before.get, 1);

        // The budget is per call: the next call starts fresh.
        store.set("k", "w").await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_error_propagates() {
        let (contents, store) = store();
        store.set("k", "v").await.unwrap();
        contents.inject_conflicts("k", 1).await;
        contents.fail_reads(1);
        let before = contents.calls();

        assert!(matches!(store.set("k", "w").await, Err(Error::Transport(_))));
        assert_eq!(contents.calls().put - before.put, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (contents, store) = store();
        store.set("k", "v").await.unwrap();

        let deleted = store.delete("k").await.unwrap();
        assert_eq!(deleted.name, "k");
        assert!(!deleted.commit.is_empty());
        assert!(store.cached_version("k").await.is_none());

        assert!(store.delete("k").await.unwrap().is_not_found());
        assert!(store.delete("never-existed").await.unwrap().is_not_found());
        assert!(store.get("k").await.unwrap().is_not_found());
        assert!(contents.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_without_known_sha_refreshes() {
        let (contents, store) = store();
        let binding = store.binding().await;
        contents.write_externally(&binding, "k", "v").await;

        let deleted = store.delete("k").await.unwrap();
        assert!(!deleted.is_not_found());
        assert_eq!(contents.calls(), CallCounts { get: 1, list: 0, put: 0, delete: 2 });
    }

    #[tokio::test]
    async fn test_delete_conflict_on_vanished_key_is_satisfied() {
        let (contents, store) = store();
        let binding = store.binding().await;
        store.set("k", "v").await.unwrap();
        contents.inject_conflicts("k", 1).await;
        contents.remove_externally(&binding, "k").await;

        assert!(store.delete("k").await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_second_conflict_exhausts_retry() {
        let (contents, store) = store();
        store.set("k", "v").await.unwrap();
        contents.inject_conflicts("k", 2).await;
        let before = contents.calls();

        match store.delete("k").await {
            Err(Error::ConflictRetryExhausted { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected exhausted retry, got {:?}", other),
        }

        let after = store.api().calls();
        assert_eq!(after.get - before.get, 1);
        assert_eq!(after.delete - before.delete, 2);
        assert_eq!(contents.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_refresh_error_propagates() {
        let (contents, store) = store();
        store.set("k", "v").await.unwrap();
        contents.inject_conflicts("k", 1).await;
        contents.fail_reads(1);
        let before = contents.calls();

        assert!(matches!(store.delete("k").await, Err(Error::Transport(_))));

        let after = contents.calls();
        assert_eq!(after.delete - before.delete, 1);
        assert_eq!(after.get - before.get, 1);
        assert!(!contents.is_empty().await);
    }

    #[tokio::test]
    async fn test_overlong_key_rejected_before_remote_call() {
        let (contents, store) = store();
        let key = "k".repeat(MAX_KEY_NAME_BYTES + 1);

        assert!(matches!(store.set(&key, "v").await, Err(Error::InvalidInput(_))));
        assert!(matches!(store.get(&key).await, Err(Error::InvalidInput(_))));
        assert!(matches!(store.delete(&key).await, Err(Error::InvalidInput(_))));
        assert_eq!(contents.calls(), CallCounts::default());

        let key = "k".repeat(MAX_KEY_NAME_BYTES);
        store.set(&key, "v").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().content, "v");
    }

    #[tokio::test]
    async fn test_list_caches_versions() {
        let (contents, store) = store();
        let binding = store.binding().await;
        contents.write_externally(&binding, "a", "1").await;
        contents.write_externally(&binding, "b", "2").await;

        let mut names: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.name).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        // Hash known from the listing: overwrite needs no refresh.
        store.set("a", "changed").await.unwrap();
        assert_eq!(contents.calls().get, 0);
        assert_eq!(contents.calls().put, 1);
    }

    #[tokio::test]
    async fn test_list_of_missing_database_is_namespace_error() {
        let (_, store) = store();
        assert!(matches!(store.list().await, Err(Error::NamespaceNotFound(_))));
    }

    #[tokio::test]
    async fn test_use_namespace_isolates_keys() {
        let (_, store) = store();
        store.set("k", "in default").await.unwrap();

        store.use_namespace("other").await;
        assert!(store.get("k").await.unwrap().is_not_found());
        assert!(store.cached_version("k").await.is_none());
        store.set("k", "in other").await.unwrap();

        store.use_namespace("default").await;
        assert_eq!(store.get("k").await.unwrap().content, "in default");
    }

    #[tokio::test]
    async fn test_setters_retarget_binding() {
        let (_, store) = store();
        store.set_host("someone", "elsewhere").await;
        store.set_branch("dev").await;
        store.set_token("t0k3n").await;

        let binding = store.binding().await;
        assert_eq!(binding.owner, "someone");
        assert_eq!(binding.repo, "elsewhere");
        assert_eq!(binding.branch, "dev");
        assert_eq!(binding.token.as_deref(), Some("t0k3n"));
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected_before_remote_call() {
        let (contents, store) = store();
        assert!(matches!(store.get("").await, Err(Error::InvalidInput(_))));
        assert!(matches!(store.set("a/b", "v").await, Err(Error::InvalidInput(_))));
        assert_eq!(contents.calls(), CallCounts::default());
    }

    #[test]
    fn test_decode_content_accepts_wrapped_base64() {
        let item = ContentItem {
            name: "k".to_string(),
            content: Some("aGVs\nbG8g\nd29y\nbGQ=\n".to_string()),
            encoding: Some("base64".to_string()),
            ..ContentItem::default()
        };
        assert_eq!(decode_content(&item).unwrap(), "hello world");
    }

    #[test]
    fn test_decode_content_rejects_unknown_encoding() {
        let item = ContentItem {
            name: "big".to_string(),
            content: Some(String::new()),
            encoding: Some("none".to_string()),
            ..ContentItem::default()
        };
        assert!(matches!(decode_content(&item), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_record_from_delete_response_keeps_key() {
        let response = WriteResponse {
            content: None,
            commit: crate::contents::CommitInfo { sha: "c0ffee".to_string() },
        };
        let record = record_from_write(response, "k");
        assert_eq!(record.name, "k");
        assert_eq!(record.commit, "c0ffee");
        assert!(!record.is_not_found());
    }
}
