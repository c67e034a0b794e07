//! Store configuration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use gitkv_common::types::{DEFAULT_BRANCH, DEFAULT_DATABASE};
use gitkv_common::{Committer, Error, HostLocator, Result};

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "GITKV_TOKEN";

/// Configuration file name inside the config directory.
pub const CONFIG_FILENAME: &str = "config.json";

const REDACTED: &str = "[REDACTED]";

/// Everything needed to connect a [`crate::KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Clone URL of the backing repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Directory inside the repository that holds the keys.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub committer: Committer,
    /// Override of the provider's API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Passphrase enabling encryption of keys and values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_cache() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            database: default_database(),
            branch: default_branch(),
            committer: Committer::default(),
            api_base: None,
            secret: None,
            cache: default_cache(),
        }
    }
}

impl StoreConfig {
    /// Configuration bound to `host` with every other field defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Platform config file location, e.g. `~/.config/gitkv/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitkv").join(CONFIG_FILENAME))
    }

    /// Load configuration from a JSON file.
    ///
    /// # Postconditions
    /// - A missing file yields the default configuration
    ///
    /// # Errors
    /// - `Io` if the file exists but cannot be read
    /// - `Serialization` if the file is not valid configuration
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Check field values that serde cannot.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty database or branch name
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::InvalidInput("Database name cannot be empty".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(Error::InvalidInput("Branch name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Copy with token and secret masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            token: self.token.as_ref().map(|_| REDACTED.to_string()),
            secret: self.secret.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }

    /// Provider configuration for the registry factory of `locator`.
    pub fn remote_config(&self, locator: &HostLocator) -> Value {
        let mut config = json!({
            "owner": locator.owner,
            "repo": locator.repo,
            "database": self.database,
            "branch": self.branch,
            "committer": self.committer,
        });
        if let Some(token) = &self.token {
            config["token"] = json!(token);
        }
        if let Some(api_base) = &self.api_base {
            config["api_base"] = json!(api_base);
        }
        config
    }
}
