//! Key-value store facade.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use gitkv_common::{Binding, Error, HostLocator, Record, Result};
use gitkv_crypto::{decrypt_str, derive_key, encrypt_str, IvMode, SecretKey};
use gitkv_storage::{RemoteStore, StoreRegistry};

use crate::cache::ReadCache;
use crate::config::StoreConfig;

/// Facade state, guarded as one unit so operations never interleave.
struct State {
    cache: ReadCache,
    secret: Option<SecretKey>,
}

impl State {
    /// Name of `key` in the remote store.
    ///
    /// Key names use a synthetic IV so the same key always maps to the
    /// same file.
    fn remote_key(&self, key: &str) -> Result<String> {
        match &self.secret {
            Some(secret) => encrypt_str(secret, key, IvMode::Synthetic),
            None => Ok(key.to_string()),
        }
    }

    fn remote_value(&self, value: &str) -> Result<String> {
        match &self.secret {
            Some(secret) => encrypt_str(secret, value, IvMode::Random),
            None => Ok(value.to_string()),
        }
    }
}

/// Key-value store over a remote repository.
///
/// All operations take and return plaintext keys and values. With a secret
/// installed, key names and values are AES encrypted before they leave the
/// process.
pub struct KeyValueStore {
    remote: Arc<dyn RemoteStore>,
    state: Mutex<State>,
}

impl KeyValueStore {
    /// Wrap a remote store with an enabled cache and no secret.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            state: Mutex::new(State {
                cache: ReadCache::default(),
                secret: None,
            }),
        }
    }

    /// Connect to the repository named by `config.host`.
    ///
    /// # Preconditions
    /// - `config.host` is set
    ///
    /// # Postconditions
    /// - The store is bound to the configured database and branch
    /// - The secret and cache flag from `config` are applied
    ///
    /// # Errors
    /// - `InvalidInput` if the host is missing or the config is invalid
    /// - `MalformedHost` if the host cannot be parsed
    /// - `UnsupportedProvider` if no adapter exists for the host
    pub async fn connect(registry: &StoreRegistry, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("No host configured".to_string()))?;
        let locator = HostLocator::parse(host)?;

        let remote = registry.resolve(&locator.provider, config.remote_config(&locator))?;
        info!(host = %locator, database = %config.database, branch = %config.branch, "Connected");

        let store = Self::new(remote);
        if let Some(secret) = &config.secret {
            store.set_secret(secret).await?;
        }
        store.set_cache_enabled(config.cache).await;
        Ok(store)
    }

    /// Provider of the underlying remote store.
    pub fn provider(&self) -> &str {
        self.remote.provider()
    }

    /// Read `key`.
    ///
    /// # Returns
    /// - The cached record if present
    /// - The not-found sentinel if the key does not exist
    ///
    /// # Errors
    /// - `Crypto` if the stored value cannot be decrypted with the secret
    /// - Remote errors
    pub async fn get(&self, key: &str) -> Result<Record> {
        let mut state = self.state.lock().await;
        self.get_locked(&mut state, key).await
    }

    /// Create or overwrite `key`.
    ///
    /// The returned record carries the plaintext value.
    pub async fn set(&self, key: &str, value: &str) -> Result<Record> {
        let mut state = self.state.lock().await;
        self.set_locked(&mut state, key, value).await
    }

    /// Append `suffix` to the current value of `key`, creating it if absent.
    ///
    /// Atomic against other callers of this instance, not against other
    /// writers of the repository.
    pub async fn append(&self, key: &str, suffix: &str) -> Result<Record> {
        let mut state = self.state.lock().await;
        let current = self.get_locked(&mut state, key).await?;
        let value = format!("{}{}", current.content, suffix);
        self.set_locked(&mut state, key, &value).await
    }

    /// Remove `key`.
    ///
    /// # Returns
    /// - The not-found sentinel if the key did not exist
    pub async fn delete(&self, key: &str) -> Result<Record> {
        let mut state = self.state.lock().await;
        let remote_key = state.remote_key(key)?;

        let result = self.remote.delete(&remote_key).await;
        state.cache.remove(key);

        let mut record = result?;
        if state.secret.is_some() && !record.is_not_found() {
            record.name = key.to_string();
        }
        Ok(record)
    }

    /// Every record stored in the current database.
    ///
    /// Records are returned as stored: with a secret set, names are the
    /// encrypted key names.
    pub async fn keys(&self) -> Result<Vec<Record>> {
        let _state = self.state.lock().await;
        self.remote.list().await
    }

    /// Point the store at another repository of the same provider.
    ///
    /// # Errors
    /// - `MalformedHost` if `host` cannot be parsed
    /// - `UnsupportedProvider` if `host` belongs to another provider
    pub async fn set_host(&self, host: &str) -> Result<()> {
        let locator = HostLocator::parse(host)?;
        if locator.provider != self.remote.provider() {
            return Err(Error::UnsupportedProvider(locator.provider));
        }

        let mut state = self.state.lock().await;
        self.remote.set_host(&locator.owner, &locator.repo).await;
        state.cache.clear();
        debug!(host = %locator, "Host changed");
        Ok(())
    }

    /// Switch the branch reads and commits go to.
    pub async fn set_branch(&self, branch: &str) {
        let mut state = self.state.lock().await;
        self.remote.set_branch(branch).await;
        state.cache.clear();
    }

    /// Replace the access token.
    pub async fn set_token(&self, token: &str) {
        let _state = self.state.lock().await;
        self.remote.set_token(token).await;
    }

    /// Switch to another database directory.
    pub async fn use_database(&self, database: &str) {
        let mut state = self.state.lock().await;
        self.remote.use_namespace(database).await;
        state.cache.clear();
        debug!(database = %database, "Database changed");
    }

    /// Enable encryption with a key derived from `passphrase`.
    ///
    /// # Errors
    /// - `InvalidInput` if `passphrase` is empty
    pub async fn set_secret(&self, passphrase: &str) -> Result<()> {
        let key = derive_key(passphrase)?;
        self.state.lock().await.secret = Some(key);
        Ok(())
    }

    /// Disable encryption.
    pub async fn clear_secret(&self) {
        self.state.lock().await.secret = None;
    }

    /// Turn the read cache on or off. Turning it off empties it.
    pub async fn set_cache_enabled(&self, enabled: bool) {
        self.state.lock().await.cache.set_enabled(enabled);
    }

    /// Empty the read cache.
    pub async fn clear_cache(&self) {
        self.state.lock().await.cache.clear();
    }

    /// Current remote target.
    pub async fn binding(&self) -> Binding {
        self.remote.binding().await
    }

    async fn get_locked(&self, state: &mut State, key: &str) -> Result<Record> {
        if let Some(record) = state.cache.get(key) {
            debug!(key = %key, "Cache hit");
            return Ok(record);
        }

        let remote_key = state.remote_key(key)?;
        let mut record = self.remote.get(&remote_key).await?;

        if let Some(secret) = &state.secret {
            if !record.content.is_empty() {
                record.content = decrypt_str(secret, &record.content)?;
            }
            if !record.is_not_found() {
                record.name = key.to_string();
            }
        }

        state.cache.insert(key, record.clone());
        Ok(record)
    }

    async fn set_locked(&self, state: &mut State, key: &str, value: &str) -> Result<Record> {
        let remote_key = state.remote_key(key)?;
        let remote_value = state.remote_value(value)?;

        let mut record = self.remote.set(&remote_key, &remote_value).await?;
        record.content = value.to_string();
        record.name = key.to_string();

        state.cache.insert(key, record.clone());
        Ok(record)
    }
}
