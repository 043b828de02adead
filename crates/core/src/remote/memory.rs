//! In-memory [`RemoteWorkspace`].
//!
//! Behaves like the workspace API for the six operations the engine uses and
//! records every call, so tests can assert on call counts and ordering.
//! Failures can be injected per operation and path.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::RemoteWorkspace;
use crate::codec::ContentCodec;
use crate::errors::RemoteError;
use crate::language::LanguageTag;
use crate::models::RemoteNode;

/// The operation a recorded call performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Probe,
    List,
    Fetch,
    Push,
    CreateContainer,
    Delete,
}

impl RemoteOp {
    /// Push, create and delete change the workspace.
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Push | Self::CreateContainer | Self::Delete)
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Container,
    Leaf {
        language: Option<LanguageTag>,
        content: String,
    },
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    calls: Vec<RemoteCall>,
    failures: HashSet<(RemoteOp, String)>,
    /// Nodes appended to a listing regardless of their path.
    extra_children: BTreeMap<String, Vec<RemoteNode>>,
}

/// Workspace held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    state: Mutex<State>,
}

fn parent_of(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) if path != "/" => Some("/"),
        Some((parent, _)) if !parent.is_empty() => Some(parent),
        _ => None,
    }
}

fn is_under(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.strip_prefix(ancestor)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn injected(path: &str) -> RemoteError {
    RemoteError::Api {
        status: 503,
        error_code: "TEMPORARILY_UNAVAILABLE".into(),
        message: format!("injected failure at {}", path),
    }
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a container and its ancestors without recording a call.
    pub fn with_container(self, path: &str) -> Self {
        {
            let mut state = self.lock();
            insert_containers(&mut state.entries, path);
        }
        self
    }

    /// Seed a leaf (and its ancestor containers) without recording a call.
    pub fn with_leaf(self, path: &str, language: Option<LanguageTag>, raw: &[u8]) -> Self {
        let content = ContentCodec::encode(raw);
        self.with_transport_leaf(path, language, &content)
    }

    /// Seed a leaf whose stored transport content is taken as is, valid
    /// base64 or not.
    pub fn with_transport_leaf(
        self,
        path: &str,
        language: Option<LanguageTag>,
        content: &str,
    ) -> Self {
        {
            let mut state = self.lock();
            if let Some(parent) = parent_of(path) {
                insert_containers(&mut state.entries, parent);
            }
            state.entries.insert(
                path.to_string(),
                Entry::Leaf {
                    language,
                    content: content.to_string(),
                },
            );
        }
        self
    }

    /// Append `node` to every listing of `parent`, whatever its path.
    pub fn with_listed_child(self, parent: &str, node: RemoteNode) -> Self {
        self.lock()
            .extra_children
            .entry(parent.to_string())
            .or_default()
            .push(node);
        self
    }

    /// Make the next and every later `op` on `path` fail with a transport error.
    pub fn fail_on(&self, op: RemoteOp, path: &str) {
        self.lock().failures.insert((op, path.to_string()));
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.op.is_mutation()).count()
    }

    pub fn exists(&self, path: &str) -> bool {
        path == "/" || self.lock().entries.contains_key(path)
    }

    pub fn is_container(&self, path: &str) -> bool {
        path == "/" || matches!(self.lock().entries.get(path), Some(Entry::Container))
    }

    /// Language and decoded content of a leaf.
    pub fn leaf(&self, path: &str) -> Option<(Option<LanguageTag>, Vec<u8>)> {
        match self.lock().entries.get(path) {
            Some(Entry::Leaf { language, content }) => {
                ContentCodec::decode(content).ok().map(|raw| (*language, raw))
            }
            _ => None,
        }
    }

    /// Every path at or below `root`, sorted.
    pub fn paths_under(&self, root: &str) -> Vec<String> {
        self.lock()
            .entries
            .keys()
            .filter(|p| p.as_str() == root || is_under(p, root))
            .cloned()
            .collect()
    }

    fn record(&self, op: RemoteOp, path: &str) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall {
            op,
            path: path.to_string(),
        });
        if state.failures.contains(&(op, path.to_string())) {
            return Err(injected(path));
        }
        Ok(state)
    }
}

fn insert_containers(entries: &mut BTreeMap<String, Entry>, path: &str) {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        entries.entry(current.clone()).or_insert(Entry::Container);
    }
}

fn not_found(path: &str) -> RemoteError {
    RemoteError::NotFound {
        path: path.to_string(),
    }
}

#[async_trait]
impl RemoteWorkspace for InMemoryWorkspace {
    async fn probe_existence(&self, path: &str) -> Result<RemoteNode, RemoteError> {
        let state = self.record(RemoteOp::Probe, path)?;
        if path == "/" {
            return Ok(RemoteNode::container("/"));
        }
        match state.entries.get(path) {
            Some(Entry::Container) => Ok(RemoteNode::container(path)),
            Some(Entry::Leaf { language, .. }) => Ok(RemoteNode::leaf(path, *language)),
            None => Err(not_found(path)),
        }
    }

    async fn list_children(&self, path: &str) -> Result<Vec<RemoteNode>, RemoteError> {
        let state = self.record(RemoteOp::List, path)?;
        if path != "/" && !state.entries.contains_key(path) {
            return Err(not_found(path));
        }
        let mut children: Vec<RemoteNode> = state
            .entries
            .iter()
            .filter(|(p, _)| parent_of(p) == Some(path))
            .map(|(p, entry)| match entry {
                Entry::Container => RemoteNode::container(p.clone()),
                Entry::Leaf { language, .. } => RemoteNode::leaf(p.clone(), *language),
            })
            .collect();
        if let Some(extra) = state.extra_children.get(path) {
            children.extend(extra.iter().cloned());
        }
        Ok(children)
    }

    async fn fetch_content(&self, path: &str) -> Result<String, RemoteError> {
        let state = self.record(RemoteOp::Fetch, path)?;
        match state.entries.get(path) {
            Some(Entry::Leaf { content, .. }) => Ok(content.clone()),
            Some(Entry::Container) => Err(RemoteError::Api {
                status: 400,
                error_code: "INVALID_PARAMETER_VALUE".into(),
                message: format!("{} is a directory", path),
            }),
            None => Err(not_found(path)),
        }
    }

    async fn push_content(
        &self,
        path: &str,
        language: LanguageTag,
        content: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.record(RemoteOp::Push, path)?;
        if state.entries.contains_key(path) {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
                detail: "node already exists".into(),
            });
        }
        let parent = parent_of(path).unwrap_or("/");
        if parent != "/" && !matches!(state.entries.get(parent), Some(Entry::Container)) {
            return Err(not_found(parent));
        }
        state.entries.insert(
            path.to_string(),
            Entry::Leaf {
                language: Some(language),
                content: content.to_string(),
            },
        );
        Ok(())
    }

    async fn create_container(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.record(RemoteOp::CreateContainer, path)?;
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if let Some(Entry::Leaf { .. }) = state.entries.get(&current) {
                return Err(RemoteError::Conflict {
                    path: current,
                    detail: "a leaf exists at this path".into(),
                });
            }
        }
        insert_containers(&mut state.entries, path);
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.record(RemoteOp::Delete, path)?;
        if !state.entries.contains_key(path) {
            return Err(not_found(path));
        }
        state
            .entries
            .retain(|p, _| p.as_str() != path && !is_under(p, path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/a"), Some("/"));
        assert_eq!(parent_of("/a/b"), Some("/a"));
        assert_eq!(parent_of("/"), None);
    }

    #[tokio::test]
    async fn test_list_returns_direct_children_only() {
        let ws = InMemoryWorkspace::new()
            .with_leaf("/r/a", Some(LanguageTag::Python), b"x")
            .with_leaf("/r/sub/b", Some(LanguageTag::Sql), b"y");
        let children = ws.list_children("/r").await.unwrap();
        let paths: Vec<&str> = children.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["/r/a", "/r/sub"]);
    }

    #[tokio::test]
    async fn test_push_rejects_existing_and_orphans() {
        let ws = InMemoryWorkspace::new().with_container("/r");
        ws.push_content("/r/a", LanguageTag::R, "eA==").await.unwrap();
        assert!(matches!(
            ws.push_content("/r/a", LanguageTag::R, "eA==").await,
            Err(RemoteError::Conflict { .. })
        ));
        assert!(ws
            .push_content("/r/missing/b", LanguageTag::R, "eA==")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_subtree_only() {
        let ws = InMemoryWorkspace::new()
            .with_leaf("/r/sub/b", None, b"")
            .with_leaf("/rx/c", None, b"");
        ws.delete_subtree("/r").await.unwrap();
        assert!(!ws.exists("/r"));
        assert!(!ws.exists("/r/sub/b"));
        assert!(ws.exists("/rx/c"));
        assert_eq!(ws.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let ws = InMemoryWorkspace::new();
        ws.fail_on(RemoteOp::Probe, "/r");
        let err = ws.probe_existence("/r").await.unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(ws.calls().len(), 1);
    }
}
