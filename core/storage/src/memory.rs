//! In-memory contents backend for testing.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::digest::consts::U20;
use blake2::{Blake2b, Digest};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use gitkv_common::{Binding, Error, Result};

use crate::adapter::ContentsStore;
use crate::contents::{CommitInfo, ContentItem, ContentsApi, WriteRequest, WriteResponse};
use crate::provider::RemoteStore;

/// Key-value store backed by [`MemoryContents`].
pub type MemoryStore = ContentsStore<Arc<MemoryContents>>;

impl MemoryStore {
    /// Create a store over a fresh, empty backend.
    pub fn in_memory(binding: Binding) -> Self {
        ContentsStore::new(Arc::new(MemoryContents::new()), binding)
    }
}

/// Snapshot of how many requests reached the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub list: usize,
    pub put: usize,
    pub delete: usize,
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    sha: String,
    size: u64,
}

/// Contents API held in process memory.
///
/// Enforces the same precondition rules as the hosted API: updating or
/// deleting an existing file requires its current blob hash. Every request
/// is counted, and conflicts or read failures can be injected.
#[derive(Default)]
pub struct MemoryContents {
    files: RwLock<BTreeMap<String, StoredFile>>,
    conflicts: Mutex<HashMap<String, usize>>,
    failing_reads: AtomicUsize,
    commits: AtomicUsize,
    gets: AtomicUsize,
    lists: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

/// Git-style blob hash of `content`.
fn blob_sha(content: &[u8]) -> String {
    let mut hasher = Blake2b::<U20>::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

impl MemoryContents {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests served so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.gets.load(Ordering::SeqCst),
            list: self.lists.load(Ordering::SeqCst),
            put: self.puts.load(Ordering::SeqCst),
            delete: self.deletes.load(Ordering::SeqCst),
        }
    }

    /// Number of stored files across all namespaces.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Reject the next `count` writes or deletes of `key` with a conflict,
    /// whatever hash they carry.
    pub async fn inject_conflicts(&self, key: &str, count: usize) {
        self.conflicts.lock().await.insert(key.to_string(), count);
    }

    /// Fail the next `count` single-item reads with a transport error.
    pub fn fail_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Write `value` behind the store's back, as another client would.
    pub async fn write_externally(&self, binding: &Binding, key: &str, value: &str) {
        let file = StoredFile {
            content: STANDARD.encode(value),
            sha: blob_sha(value.as_bytes()),
            size: value.len() as u64,
        };
        self.files.write().await.insert(binding.location(key), file);
    }

    /// Delete `key` behind the store's back.
    pub async fn remove_externally(&self, binding: &Binding, key: &str) {
        self.files.write().await.remove(&binding.location(key));
    }

    async fn take_conflict(&self, key: &str) -> bool {
        let mut conflicts = self.conflicts.lock().await;
        match conflicts.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_read_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn next_commit(&self) -> CommitInfo {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        CommitInfo {
            sha: format!("{:040x}", n),
        }
    }

    fn item(binding: &Binding, key: &str, file: &StoredFile, with_content: bool) -> ContentItem {
        ContentItem {
            name: key.to_string(),
            path: format!("{}/{}", binding.database, key),
            sha: file.sha.clone(),
            size: file.size,
            kind: "file".to_string(),
            download_url: None,
            html_url: None,
            content: with_content.then(|| file.content.clone()),
            encoding: with_content.then(|| "base64".to_string()),
        }
    }

    /// Check the precondition hash of a write against the stored file.
    fn check_version(
        key: &str,
        current: Option<&StoredFile>,
        expected: Option<&str>,
    ) -> Result<()> {
        match (current, expected) {
            (None, None) => Ok(()),
            (Some(file), Some(sha)) if file.sha == sha => Ok(()),
            (Some(_), None) => Err(Error::VersionConflict(format!(
                "\"sha\" wasn't supplied for existing key {}",
                key
            ))),
            (Some(_), Some(_)) => Err(Error::VersionConflict(format!(
                "{} does not match the current version",
                key
            ))),
            (None, Some(_)) => Err(Error::VersionConflict(format!(
                "{} does not exist at the supplied version",
                key
            ))),
        }
    }
}

#[async_trait]
impl ContentsApi for MemoryContents {
    fn provider(&self) -> &str {
        "memory"
    }

    async fn get_item(&self, binding: &Binding, key: &str) -> Result<ContentItem> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.take_read_failure() {
            return Err(Error::Transport("Injected read failure".to_string()));
        }

        let files = self.files.read().await;
        files
            .get(&binding.location(key))
            .map(|file| Self::item(binding, key, file, true))
            .ok_or_else(|| Error::NotFound(binding.location(key)))
    }

    async fn list_items(&self, binding: &Binding) -> Result<Vec<ContentItem>> {
        self.lists.fetch_add(1, Ordering::SeqCst);

        let prefix = binding.location("");
        let files = self.files.read().await;
        let items: Vec<ContentItem> = files
            .range(prefix.clone()..)
            .take_while(|(location, _)| location.starts_with(&prefix))
            .map(|(location, file)| Self::item(binding, &location[prefix.len()..], file, false))
            .collect();

        // An empty directory does not exist in git.
        if items.is_empty() {
            return Err(Error::NamespaceNotFound(format!(
                "{}/{}",
                binding.repo, binding.database
            )));
        }
        Ok(items)
    }

    async fn put_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.take_conflict(key).await {
            return Err(Error::VersionConflict(format!("Injected conflict on {}", key)));
        }

        let content = request
            .content
            .clone()
            .ok_or_else(|| Error::BadRequest("Write request without content".to_string()))?;
        let raw = STANDARD
            .decode(&content)
            .map_err(|e| Error::BadRequest(format!("content is not valid Base64: {}", e)))?;

        let location = binding.location(key);
        let mut files = self.files.write().await;
        Self::check_version(key, files.get(&location), request.sha.as_deref())?;

        let file = StoredFile {
            sha: blob_sha(&raw),
            size: raw.len() as u64,
            content,
        };
        let item = Self::item(binding, key, &file, false);
        files.insert(location, file);

        Ok(WriteResponse {
            content: Some(item),
            commit: self.next_commit(),
        })
    }

    async fn delete_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.take_conflict(key).await {
            return Err(Error::VersionConflict(format!("Injected conflict on {}", key)));
        }

        let location = binding.location(key);
        let mut files = self.files.write().await;
        let Some(current) = files.get(&location) else {
            return Err(Error::NotFound(location));
        };
        Self::check_version(key, Some(current), request.sha.as_deref())?;
        files.remove(&location);

        Ok(WriteResponse {
            content: None,
            commit: self.next_commit(),
        })
    }
}

/// Registry factory: the configuration is a serialized [`Binding`].
pub fn create_memory_store(config: Value) -> Result<Arc<dyn RemoteStore>> {
    let binding: Binding = serde_json::from_value(config)
        .map_err(|e| Error::InvalidInput(format!("Invalid memory store config: {}", e)))?;
    Ok(Arc::new(MemoryStore::in_memory(binding)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitkv_common::Committer;

    fn request(content: Option<&str>, sha: Option<&str>) -> WriteRequest {
        WriteRequest {
            message: "m".to_string(),
            content: content.map(|c| STANDARD.encode(c)),
            sha: sha.map(str::to_string),
            branch: "master".to_string(),
            committer: Committer::default(),
        }
    }

    #[test]
    fn test_blob_sha_shape() {
        // Same length as git object ids.
        assert_eq!(blob_sha(b"hello").len(), 40);
        assert_ne!(blob_sha(b"hello"), blob_sha(b"hello!"));
    }

    #[tokio::test]
    async fn test_create_requires_no_sha() {
        let contents = MemoryContents::new();
        let binding = Binding::new("o", "r");

        let created = contents
            .put_item(&binding, "k", &request(Some("v"), None))
            .await
            .unwrap();
        let sha = created.content.unwrap().sha;

        let missing_sha = contents.put_item(&binding, "k", &request(Some("w"), None)).await;
        assert!(matches!(missing_sha, Err(Error::VersionConflict(_))));

        let stale = contents
            .put_item(&binding, "k", &request(Some("w"), Some("deadbeef")))
            .await;
        assert!(matches!(stale, Err(Error::VersionConflict(_))));

        contents
            .put_item(&binding, "k", &request(Some("w"), Some(&sha)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sha_for_missing_file_conflicts() {
        let contents = MemoryContents::new();
        let binding = Binding::new("o", "r");
        let result = contents
            .put_item(&binding, "k", &request(Some("v"), Some("deadbeef")))
            .await;
        assert!(matches!(result, Err(Error::VersionConflict(_))));
    }

    #[tokio::test]
    async fn test_get_and_delete_missing() {
        let contents = MemoryContents::new();
        let binding = Binding::new("o", "r");

        assert!(matches!(
            contents.get_item(&binding, "k").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            contents.delete_item(&binding, "k", &request(None, None)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_database() {
        let contents = MemoryContents::new();
        let main = Binding::new("o", "r");
        let other = Binding::new("o", "r").with_database("default2");

        contents.write_externally(&main, "a", "1").await;
        contents.write_externally(&main, "b", "2").await;
        contents.write_externally(&other, "c", "3").await;

        let names: Vec<String> = contents
            .list_items(&main)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let empty = Binding::new("o", "r").with_database("nothing");
        assert!(matches!(
            contents.list_items(&empty).await,
            Err(Error::NamespaceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let contents = MemoryContents::new();
        let binding = Binding::new("o", "r");
        contents.inject_conflicts("k", 1).await;

        assert!(contents
            .put_item(&binding, "k", &request(Some("v"), None))
            .await
            .is_err());
        assert!(contents
            .put_item(&binding, "k", &request(Some("v"), None))
            .await
            .is_ok());
        assert_eq!(contents.calls().put, 2);
    }

    #[tokio::test]
    async fn test_factory_reads_binding() {
        let store = create_memory_store(serde_json::json!({
            "owner": "o",
            "repo": "r",
            "branch": "dev"
        }))
        .unwrap();

        assert_eq!(store.provider(), "memory");
        let binding = store.binding().await;
        assert_eq!(binding.branch, "dev");
        assert_eq!(binding.database, "default");
    }
}
