//! Common types used throughout gitkv.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default database directory inside the repository.
pub const DEFAULT_DATABASE: &str = "default";

/// Default branch written to and read from.
pub const DEFAULT_BRANCH: &str = "master";

/// One key's value plus the provenance the remote reported for it.
///
/// The all-default record (empty `name`) is the not-found sentinel: absence
/// is a value, not an error. Use [`Record::is_not_found`] rather than checking
/// `content`, since an empty value is a legitimate stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Decoded value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// File name of the key in the remote store.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Stored size in bytes, as reported by the remote.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
    /// Raw download URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_url: String,
    /// Browser URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub html_url: String,
    /// Commit that produced this version, when the operation was a write.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    /// Blob hash of this version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Record {
    /// The not-found sentinel.
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Whether this record is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        self.name.is_empty()
    }
}

/// Identity recorded as committer on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Default for Committer {
    fn default() -> Self {
        Self {
            name: "gitkv".to_string(),
            email: "gitkv@users.noreply.local".to_string(),
        }
    }
}

/// The remote namespace an adapter is bound to.
///
/// Owner and repo select the repository, `database` is the directory inside
/// it that holds one file per key, and `branch` is where commits land.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub committer: Committer,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Binding {
    /// Create a binding with default database, branch and committer.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            database: default_database(),
            branch: default_branch(),
            committer: Committer::default(),
        }
    }

    /// Set the access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the database directory.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Fully qualified location of `key`, unique across repositories,
    /// branches and databases.
    pub fn location(&self, key: &str) -> String {
        format!(
            "{}/{}@{}:{}/{}",
            self.owner, self.repo, self.branch, self.database, key
        )
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("branch", &self.branch)
            .field("committer", &self.committer)
            .finish()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}) /{}",
            self.owner, self.repo, self.branch, self.database
        )
    }
}
