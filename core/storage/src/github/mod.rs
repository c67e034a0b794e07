//! GitHub storage provider for gitkv.
//!
//! Keys are files under `<database>/` in a repository; every write is a
//! commit on the bound branch made through the REST contents API.

pub mod client;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use gitkv_common::{Binding, Error, Result};

use crate::adapter::ContentsStore;
use crate::provider::RemoteStore;

pub use client::{GitHubClient, GITHUB_API_BASE};

/// Key-value store over the GitHub contents API.
pub type GitHubStore = ContentsStore<GitHubClient>;

/// GitHub provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(flatten)]
    pub binding: Binding,
    /// Override of the REST endpoint, e.g. for GitHub Enterprise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl GitHubStore {
    /// Create a store from its configuration.
    pub fn from_config(config: GitHubConfig) -> Result<Self> {
        let client = GitHubClient::new(config.api_base.as_deref())?;
        Ok(ContentsStore::new(client, config.binding))
    }
}

/// Create a GitHub store from JSON configuration.
pub fn create_github_store(config: serde_json::Value) -> Result<Arc<dyn RemoteStore>> {
    let config: GitHubConfig = serde_json::from_value(config)
        .map_err(|e| Error::InvalidInput(format!("Invalid GitHub config: {}", e)))?;

    Ok(Arc::new(GitHubStore::from_config(config)?))
}
