//! File-policy enforcement for sync operations.
//!
//! Provides [`FilePolicy`] which encapsulates `max_file_size` and
//! `ignore_patterns` from [`OptionsConfig`] and evaluates each leaf before it
//! is transferred, in either direction.
//!
//! # Decision model
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | Path matches an ignore pattern | `Ignored` |
//! | Size exceeds `max_file_size` (when > 0) | `Oversize` |
//! | None of the above | `Allow` |
//!
//! Paths are relative to the sync root, `/`-separated, and carry the local
//! extension (`sub/b.sql`) in both directions so one pattern set applies to
//! uploads and downloads alike.

use tracing::{debug, warn};

use crate::config::OptionsConfig;
use crate::models::SkipReason;

/// The outcome of evaluating a node against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePolicyDecision {
    /// Sync it normally.
    Allow,
    /// Matches an ignore pattern.
    Ignored { pattern: String },
    /// Exceeds the configured `max_file_size`.
    Oversize { size: u64, limit: u64 },
}

impl FilePolicyDecision {
    /// The skip reason to record, if the node is blocked.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Allow => None,
            Self::Ignored { pattern } => Some(SkipReason::Ignored {
                pattern: pattern.clone(),
            }),
            Self::Oversize { size, limit } => Some(SkipReason::Oversize {
                size: *size,
                limit: *limit,
            }),
        }
    }
}

/// Evaluates candidate nodes against size limits and ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct FilePolicy {
    /// Maximum allowed file size in bytes. 0 = no limit.
    max_file_size: u64,
    /// Glob patterns to exclude, matched against the relative path.
    ignore_patterns: Vec<String>,
}

impl FilePolicy {
    pub fn new(max_file_size: u64, ignore_patterns: Vec<String>) -> Self {
        Self {
            max_file_size,
            ignore_patterns,
        }
    }

    /// Check only the ignore patterns. Used for directories, which have no size.
    pub fn ignored_by(&self, rel_path: &str) -> Option<&str> {
        let path = rel_path.replace('\\', "/");
        self.ignore_patterns
            .iter()
            .find(|pattern| glob_match::glob_match(&pattern.replace('\\', "/"), &path))
            .map(String::as_str)
    }

    /// Evaluate a leaf of `size` bytes.
    pub fn evaluate(&self, rel_path: &str, size: u64) -> FilePolicyDecision {
        if let Some(pattern) = self.ignored_by(rel_path) {
            debug!(path = rel_path, pattern, "path matches ignore pattern");
            return FilePolicyDecision::Ignored {
                pattern: pattern.to_string(),
            };
        }

        if self.max_file_size > 0 && size > self.max_file_size {
            warn!(
                path = rel_path,
                size,
                limit = self.max_file_size,
                "file exceeds max_file_size, skipping"
            );
            return FilePolicyDecision::Oversize {
                size,
                limit: self.max_file_size,
            };
        }

        FilePolicyDecision::Allow
    }

}

impl From<&OptionsConfig> for FilePolicy {
    fn from(opts: &OptionsConfig) -> Self {
        Self::new(opts.max_file_size, opts.ignore_patterns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_when_no_constraints() {
        let policy = FilePolicy::new(0, vec![]);
        let decision = policy.evaluate("etl/load.py", 1024);
        assert_eq!(decision, FilePolicyDecision::Allow);
        assert!(decision.skip_reason().is_none());
    }

    #[test]
    fn test_oversize_blocks_file() {
        let policy = FilePolicy::new(1000, vec![]);
        let decision = policy.evaluate("big.sql", 2000);
        assert_eq!(
            decision,
            FilePolicyDecision::Oversize {
                size: 2000,
                limit: 1000
            }
        );
        assert_eq!(
            decision.skip_reason(),
            Some(SkipReason::Oversize {
                size: 2000,
                limit: 1000
            })
        );
    }

    #[test]
    fn test_exact_limit_allowed() {
        let policy = FilePolicy::new(1000, vec![]);
        assert_eq!(policy.evaluate("exact.py", 1000), FilePolicyDecision::Allow);
    }

    #[test]
    fn test_ignore_patterns() {
        let policy = FilePolicy::new(
            0,
            vec!["**/.ipynb_checkpoints/**".into(), "scratch_*.py".into()],
        );
        assert_eq!(
            policy.evaluate("nb/.ipynb_checkpoints/a-checkpoint.py", 10),
            FilePolicyDecision::Ignored {
                pattern: "**/.ipynb_checkpoints/**".into()
            }
        );
        assert_ne!(policy.evaluate("scratch_1.py", 10), FilePolicyDecision::Allow);
        assert_eq!(policy.evaluate("nb/scratch_1.py", 10), FilePolicyDecision::Allow);
        assert_eq!(policy.evaluate("nb/a.py", 10), FilePolicyDecision::Allow);
    }

    #[test]
    fn test_ignore_checked_before_size() {
        let policy = FilePolicy::new(100, vec!["*.sql".into()]);
        assert!(matches!(
            policy.evaluate("data.sql", 5000),
            FilePolicyDecision::Ignored { .. }
        ));
    }

    #[test]
    fn test_ignored_by_for_directories() {
        let policy = FilePolicy::new(0, vec!["archive".into(), "**/tmp".into()]);
        assert_eq!(policy.ignored_by("archive"), Some("archive"));
        assert_eq!(policy.ignored_by("a/b/tmp"), Some("**/tmp"));
        assert_eq!(policy.ignored_by("src"), None);
    }

    #[test]
    fn test_from_options_config() {
        let opts = OptionsConfig {
            max_file_size: 5000,
            ignore_patterns: vec!["*.tmp".into()],
        };
        let policy = FilePolicy::from(&opts);
        assert_eq!(policy.evaluate("data.csv", 5000), FilePolicyDecision::Allow);
        assert!(matches!(
            policy.evaluate("data.csv", 5001),
            FilePolicyDecision::Oversize { limit: 5000, .. }
        ));
        assert!(matches!(
            policy.evaluate("data.tmp", 100),
            FilePolicyDecision::Ignored { .. }
        ));
    }
}
