//! Common error types for gitkv.

use thiserror::Error;

/// Top-level error type for gitkv operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A keyed request found nothing at that path.
    ///
    /// `get` and `delete` translate this into the not-found sentinel;
    /// it only reaches callers from `set`.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote rejected the access token.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The repository or database directory does not exist.
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// The request was structurally wrong, e.g. a key resolved to a folder.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The precondition hash of a write was stale or missing.
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// A write still conflicted after refreshing the version hash once.
    #[error("Update of key \"{key}\" failed after refreshing its version: {message}")]
    ConflictRetryExhausted { key: String, message: String },

    /// A host string could not be parsed.
    #[error("Can not recognize host: {0}")]
    MalformedHost(String),

    /// No adapter is registered for a host provider.
    #[error("Provider \"{0}\" is not supported")]
    UnsupportedProvider(String),

    /// Any other non-success response from the remote.
    #[error("Remote error [{status}]: {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the remote rejected a write because of its precondition hash.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Error::VersionConflict(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
