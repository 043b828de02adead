//! Error types for the nbsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),
}

// ---------------------------------------------------------------------------
// Remote workspace errors
// ---------------------------------------------------------------------------

/// Errors from the remote workspace collaborator.
///
/// `NotFound` is the only variant the existence guard treats as an answer
/// rather than a failure. Everything else is a transport-level failure and
/// aborts the sync.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The requested path does not exist in the workspace.
    #[error("remote path not found: {path}")]
    NotFound { path: String },

    /// A node already exists where a new one was pushed.
    #[error("remote path already exists: {path}: {detail}")]
    Conflict { path: String, detail: String },

    /// Token missing, expired or lacking permission.
    #[error("workspace authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned a non-success status code.
    #[error("workspace API error (HTTP {status}, {error_code}): {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    /// HTTP-level transport error (network, TLS, etc.).
    #[error("workspace HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("workspace response parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// `true` only for a typed "does not exist" answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Errors from the transport encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid transport encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from the tree synchronization engine.
///
/// All of these are fatal: they unwind to the caller immediately and nothing
/// already written is rolled back.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The destination root exists and overwrite was not requested.
    #[error("destination '{destination}' already exists; pass --overwrite to replace it")]
    DestinationExists { destination: String },

    /// The source root of a download does not exist.
    #[error("source '{source_root}' does not exist")]
    SourceMissing { source_root: String },

    /// Underlying remote workspace failure.
    #[error("sync remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Leaf content could not be decoded.
    #[error("failed to decode content of '{path}': {source}")]
    Codec {
        path: String,
        #[source]
        source: CodecError,
    },

    /// Local filesystem failure (permission, disk full, missing parent).
    #[error("local I/O error at '{}': {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote listing returned a child that is not under its parent.
    #[error("remote path '{path}' is not under '{root}'")]
    PathOutsideRoot { root: String, path: String },
}

impl SyncError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from branch discovery.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository contains the given path.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// HEAD does not point at a branch.
    #[error("git HEAD is detached; set remote.branch or BUILD_SOURCEBRANCHNAME")]
    DetachedHead,

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RemoteError::NotFound {
            path: "/Users/alice/main/nb".into(),
        };
        assert_eq!(err.to_string(), "remote path not found: /Users/alice/main/nb");
        assert!(err.is_not_found());

        let err = SyncError::DestinationExists {
            destination: "/root".into(),
        };
        assert!(err.to_string().contains("--overwrite"));

        let err = ConfigError::EnvVarMissing {
            var: "DATABRICKS_TOKEN".into(),
            field: "workspace.token_env".into(),
        };
        assert!(err.to_string().contains("DATABRICKS_TOKEN"));
    }

    #[test]
    fn test_only_not_found_is_not_found() {
        let err = RemoteError::Api {
            status: 500,
            error_code: "INTERNAL_ERROR".into(),
            message: "RESOURCE_DOES_NOT_EXIST".into(),
        };
        assert!(!err.is_not_found());
        assert!(!RemoteError::Parse("bad".into()).is_not_found());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let remote = RemoteError::AuthenticationFailed("HTTP 403".into());
        let core_err: CoreError = remote.into();
        assert!(matches!(core_err, CoreError::Remote(_)));

        let sync_err: SyncError = RemoteError::Parse("x".into()).into();
        assert!(matches!(sync_err, SyncError::Remote(_)));
    }
}
