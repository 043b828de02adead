//! Depth-first walk over a remote subtree.

use tracing::trace;

use super::{relative_remote, RemoteWorkspace};
use crate::errors::SyncError;
use crate::models::RemoteNode;

/// A node yielded by the walk, with its path relative to the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub node: RemoteNode,
    pub relative_path: String,
}

/// Lazy, depth-first cursor over the descendants of a remote container.
///
/// The root itself is not yielded. A container is yielded before any of its
/// descendants, and its children are only listed on the `next` call after it
/// was yielded, so the caller can materialize it first. Uses an explicit
/// stack; each walker re-reads the live tree and holds no state beyond its
/// own traversal.
pub struct RemoteTreeWalker<'a, R: RemoteWorkspace + ?Sized> {
    remote: &'a R,
    root: String,
    stack: Vec<RemoteEntry>,
    /// Container yielded by the previous call whose children are still unlisted.
    expand: Option<RemoteEntry>,
    started: bool,
}

impl<'a, R: RemoteWorkspace + ?Sized> RemoteTreeWalker<'a, R> {
    pub fn new(remote: &'a R, root: impl Into<String>) -> Self {
        Self {
            remote,
            root: root.into(),
            stack: Vec::new(),
            expand: None,
            started: false,
        }
    }

    /// Advance the walk.
    pub async fn next(&mut self) -> Result<Option<RemoteEntry>, SyncError> {
        if !self.started {
            self.started = true;
            let root = self.root.clone();
            self.push_children(&root, "").await?;
        }

        if let Some(container) = self.expand.take() {
            self.push_children(&container.node.path, &container.relative_path)
                .await?;
        }

        let Some(entry) = self.stack.pop() else {
            return Ok(None);
        };
        if entry.node.is_container() {
            self.expand = Some(entry.clone());
        }
        trace!(path = %entry.node.path, relative = %entry.relative_path, "remote walk step");
        Ok(Some(entry))
    }

    /// Do not descend into the container returned by the last `next` call.
    pub fn skip_children(&mut self) {
        if let Some(container) = self.expand.take() {
            trace!(path = %container.node.path, "pruned remote container");
        }
    }

    /// Drain the walk into a vector.
    pub async fn collect(mut self) -> Result<Vec<RemoteEntry>, SyncError> {
        let mut out = Vec::new();
        while let Some(entry) = self.next().await? {
            out.push(entry);
        }
        Ok(out)
    }

    async fn push_children(&mut self, parent: &str, parent_relative: &str) -> Result<(), SyncError> {
        let children = self.remote.list_children(parent).await?;
        // Reverse so the first listed child is popped first.
        for child in children.into_iter().rev() {
            let segment = match relative_remote(parent, &child.path) {
                Some(seg) if !seg.is_empty() && !seg.contains('/') => seg.to_string(),
                _ => {
                    return Err(SyncError::PathOutsideRoot {
                        root: parent.to_string(),
                        path: child.path,
                    })
                }
            };
            let relative_path = if parent_relative.is_empty() {
                segment
            } else {
                format!("{}/{}", parent_relative, segment)
            };
            self.stack.push(RemoteEntry {
                node: child,
                relative_path,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageTag;
    use crate::remote::memory::{InMemoryWorkspace, RemoteOp};

    fn tree() -> InMemoryWorkspace {
        InMemoryWorkspace::new()
            .with_leaf("/root/a", Some(LanguageTag::Python), b"a")
            .with_leaf("/root/sub/b", Some(LanguageTag::Sql), b"b")
            .with_leaf("/root/sub/deeper/c", Some(LanguageTag::R), b"c")
            .with_leaf("/root/z", Some(LanguageTag::Scala), b"z")
    }

    #[tokio::test]
    async fn test_walk_is_depth_first_with_relative_paths() {
        let ws = tree();
        let entries = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap();
        let rel: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(rel, vec!["a", "sub", "sub/b", "sub/deeper", "sub/deeper/c", "z"]);
    }

    #[tokio::test]
    async fn test_children_listed_after_container_is_yielded() {
        let ws = tree();
        let mut walker = RemoteTreeWalker::new(&ws, "/root");
        walker.next().await.unwrap(); // a
        let sub = walker.next().await.unwrap().unwrap();
        assert_eq!(sub.relative_path, "sub");
        let listed: Vec<String> = ws
            .calls()
            .into_iter()
            .filter(|c| c.op == RemoteOp::List)
            .map(|c| c.path)
            .collect();
        assert_eq!(listed, vec!["/root"]);
    }

    #[tokio::test]
    async fn test_skip_children_prunes_subtree() {
        let ws = tree();
        let mut walker = RemoteTreeWalker::new(&ws, "/root");
        let mut rel = Vec::new();
        while let Some(entry) = walker.next().await.unwrap() {
            if entry.relative_path == "sub" {
                walker.skip_children();
            }
            rel.push(entry.relative_path);
        }
        assert_eq!(rel, vec!["a", "sub", "z"]);
        assert!(!ws
            .calls()
            .iter()
            .any(|c| c.op == RemoteOp::List && c.path == "/root/sub"));
    }

    #[tokio::test]
    async fn test_walk_is_restartable() {
        let ws = tree();
        let first = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap();
        let second = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_container_yields_nothing() {
        let ws = InMemoryWorkspace::new().with_container("/root");
        let entries = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let ws = tree();
        ws.fail_on(RemoteOp::List, "/root/sub");
        let err = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
    }

    #[tokio::test]
    async fn test_listed_child_outside_parent_is_rejected() {
        let ws = tree().with_listed_child("/root/sub", RemoteNode::leaf("/elsewhere/x", None));
        let err = RemoteTreeWalker::new(&ws, "/root").collect().await.unwrap_err();
        match err {
            SyncError::PathOutsideRoot { root, path } => {
                assert_eq!(root, "/root/sub");
                assert_eq!(path, "/elsewhere/x");
            }
            other => panic!("expected PathOutsideRoot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listed_grandchild_is_rejected() {
        let ws = tree().with_listed_child(
            "/root",
            RemoteNode::leaf("/root/sub/deeper/c", Some(LanguageTag::R)),
        );
        let mut walker = RemoteTreeWalker::new(&ws, "/root");
        assert!(matches!(
            walker.next().await,
            Err(SyncError::PathOutsideRoot { .. })
        ));
    }
}
