//! Domain model types used throughout nbsync.
//!
//! Everything here is transient: rebuilt from the live trees on every run and
//! never persisted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::language::LanguageTag;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Kind of a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    /// `language` is `None` when the remote reported a label outside the
    /// known set; such leaves are skipped.
    Leaf { language: Option<LanguageTag> },
}

/// A node observed in the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    /// Absolute, slash-delimited workspace path.
    pub path: String,
    pub kind: NodeKind,
}

impl RemoteNode {
    pub fn container(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Container,
        }
    }

    pub fn leaf(path: impl Into<String>, language: Option<LanguageTag>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Leaf { language },
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container)
    }
}

/// Kind of a local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Directory,
    File,
    /// Not followed.
    Symlink,
}

/// A node observed on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    pub path: PathBuf,
    pub kind: LocalKind,
}

// ---------------------------------------------------------------------------
// Sync root
// ---------------------------------------------------------------------------

/// The pair of subtrees mirrored by one invocation.
///
/// A node's counterpart is always `base + relative suffix` on the other side;
/// no separate path table exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoot {
    pub local_base: PathBuf,
    pub remote_base: String,
}

impl SyncRoot {
    pub fn new(local_base: impl Into<PathBuf>, remote_base: impl Into<String>) -> Self {
        let remote_base: String = remote_base.into();
        let trimmed = remote_base.trim_end_matches('/');
        Self {
            local_base: local_base.into(),
            remote_base: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    pub fn local_base(&self) -> &Path {
        &self.local_base
    }

    pub fn remote_base(&self) -> &str {
        &self.remote_base
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Remote → local.
    Download,
    /// Local → remote.
    Upload,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// Why a node was left out of the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Remote leaf with a language label outside the known set.
    UnrecognizedLanguage,
    /// Local file whose extension maps to no language.
    UnrecognizedExtension,
    /// Matched an ignore pattern.
    Ignored { pattern: String },
    /// Larger than the configured maximum.
    Oversize { size: u64, limit: u64 },
    /// Local symbolic link.
    Symlink,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnrecognizedLanguage => "unrecognized language",
            Self::UnrecognizedExtension => "unrecognized extension",
            Self::Ignored { .. } => "ignored",
            Self::Oversize { .. } => "oversize",
            Self::Symlink => "symlink",
        }
    }
}

/// A node left out of the destination, with its path relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    pub relative_path: String,
    pub reason: SkipReason,
}

/// Statistics from a single sync run.
#[derive(Debug, Clone)]
pub struct SyncStats {
    pub direction: SyncDirection,
    pub containers_created: usize,
    pub leaves_written: usize,
    pub bytes_transferred: u64,
    pub skipped: Vec<SkippedNode>,
    /// Whether the destination was cleared before writing.
    pub cleared_destination: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            containers_created: 0,
            leaves_written: 0,
            bytes_transferred: 0,
            skipped: Vec::new(),
            cleared_destination: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn skip(&mut self, relative_path: impl Into<String>, reason: SkipReason) {
        self.skipped.push(SkippedNode {
            relative_path: relative_path.into(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_node_kind() {
        assert!(RemoteNode::container("/a").is_container());
        assert!(!RemoteNode::leaf("/a", Some(LanguageTag::R)).is_container());
    }

    #[test]
    fn test_sync_root_trims_trailing_slash() {
        let root = SyncRoot::new("proj/nb", "/root/");
        assert_eq!(root.remote_base(), "/root");
        assert_eq!(SyncRoot::new("x", "/").remote_base(), "/");
    }

    #[test]
    fn test_stats_skip_records_reason() {
        let mut stats = SyncStats::new(SyncDirection::Upload);
        stats.skip("notes.txt", SkipReason::UnrecognizedExtension);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].reason.label(), "unrecognized extension");
        assert_eq!(stats.direction.to_string(), "upload");
    }
}
