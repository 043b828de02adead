//! Remote workspace collaborator.
//!
//! [`RemoteWorkspace`] is the capability set the sync engine consumes. The
//! HTTP implementation is [`WorkspaceClient`]; [`InMemoryWorkspace`] backs the
//! tests.

pub mod memory;
pub mod walker;
pub mod workspace;

pub use memory::{InMemoryWorkspace, RemoteCall};
pub use walker::{RemoteEntry, RemoteTreeWalker};
pub use workspace::WorkspaceClient;

use async_trait::async_trait;

use crate::errors::RemoteError;
use crate::language::LanguageTag;
use crate::models::RemoteNode;

/// Operations the engine needs from the remote workspace.
///
/// Content crosses this boundary already transport-encoded
/// (see [`crate::codec::ContentCodec`]).
#[async_trait]
pub trait RemoteWorkspace: Send + Sync {
    /// Look up a node. A missing path must be reported as
    /// [`RemoteError::NotFound`], never as another variant.
    async fn probe_existence(&self, path: &str) -> Result<RemoteNode, RemoteError>;

    /// Direct children of a container, in whatever order the remote yields.
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteNode>, RemoteError>;

    /// Transport-encoded content of a leaf.
    async fn fetch_content(&self, path: &str) -> Result<String, RemoteError>;

    /// Create a leaf. Fails with [`RemoteError::Conflict`] if the path is taken.
    async fn push_content(
        &self,
        path: &str,
        language: LanguageTag,
        content: &str,
    ) -> Result<(), RemoteError>;

    /// Create a container and any missing ancestors. Idempotent.
    async fn create_container(&self, path: &str) -> Result<(), RemoteError>;

    /// Recursively delete a subtree.
    async fn delete_subtree(&self, path: &str) -> Result<(), RemoteError>;
}

/// Append a relative suffix to a remote base path.
pub fn join_remote(base: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        return base.to_string();
    }
    let base = base.trim_end_matches('/');
    format!("{}/{}", base, relative)
}

/// Strip `base` from `path`, returning the relative suffix.
///
/// Returns `None` when `path` is not `base` itself or strictly below it.
pub fn relative_remote<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("")
    } else if base.is_empty() {
        // base was "/"
        Some(rest.trim_start_matches('/'))
    } else {
        rest.strip_prefix('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/root", "a"), "/root/a");
        assert_eq!(join_remote("/root/", "sub/b"), "/root/sub/b");
        assert_eq!(join_remote("/root", ""), "/root");
        assert_eq!(join_remote("/", "a"), "/a");
    }

    #[test]
    fn test_relative_remote() {
        assert_eq!(relative_remote("/root", "/root/a"), Some("a"));
        assert_eq!(relative_remote("/root", "/root/sub/b"), Some("sub/b"));
        assert_eq!(relative_remote("/root", "/root"), Some(""));
        assert_eq!(relative_remote("/root", "/rootless/a"), None);
        assert_eq!(relative_remote("/root", "/other/a"), None);
        assert_eq!(relative_remote("/", "/a/b"), Some("a/b"));
    }
}
