//! One-shot tree mirroring between a local directory and a remote workspace.
//!
//! The [`SyncEngine`] runs either flow end to end:
//!
//! 1. Check the source root exists.
//! 2. On upload, run the [`ExistenceGuard`] on the remote root. A download
//!    writes into the local root in place and leaves unrelated files alone.
//! 3. Create the destination root.
//! 4. Walk the source depth-first, creating each container before anything
//!    under it and transferring every leaf with a recognized language.
//!
//! Every failure after step 2 unwinds immediately. Nothing already written is
//! rolled back, so a failed run can leave a partial mirror behind.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::codec::ContentCodec;
use crate::errors::SyncError;
use crate::file_policy::FilePolicy;
use crate::guard::{ExistenceGuard, OverwriteDecision, RemoteDestination};
use crate::language::LanguageTag;
use crate::local::{read_file, LocalTreeWalker, LocalTreeWriter};
use crate::models::{LocalKind, NodeKind, SkipReason, SyncDirection, SyncRoot, SyncStats};
use crate::remote::{join_remote, RemoteTreeWalker, RemoteWorkspace};

/// Mirrors one [`SyncRoot`] in either direction.
pub struct SyncEngine<R: RemoteWorkspace> {
    remote: R,
    root: SyncRoot,
    policy: FilePolicy,
}

impl<R: RemoteWorkspace> SyncEngine<R> {
    pub fn new(remote: R, root: SyncRoot, policy: FilePolicy) -> Self {
        info!(
            local = %root.local_base().display(),
            remote = %root.remote_base(),
            "initializing sync engine"
        );
        Self {
            remote,
            root,
            policy,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Give back the remote collaborator.
    pub fn into_remote(self) -> R {
        self.remote
    }

    // -----------------------------------------------------------------------
    // Remote -> local
    // -----------------------------------------------------------------------

    /// Mirror the remote root into the local root.
    ///
    /// Leaves are written as `relative_path + "." + extension`, replacing any
    /// file already at that path. Leaves whose language is not recognized are
    /// skipped and recorded in the stats.
    #[instrument(skip(self), fields(remote = %self.root.remote_base(), local = %self.root.local_base().display()))]
    pub async fn download(&self) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats::new(SyncDirection::Download);
        let remote_base = self.root.remote_base();

        match self.remote.probe_existence(remote_base).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(SyncError::SourceMissing {
                    source_root: remote_base.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let writer = LocalTreeWriter::new(self.root.local_base());
        writer.create_base()?;

        let mut walker = RemoteTreeWalker::new(&self.remote, remote_base);
        while let Some(entry) = walker.next().await? {
            let relative = entry.relative_path;
            match entry.node.kind {
                NodeKind::Container => {
                    if let Some(pattern) = self.policy.ignored_by(&relative) {
                        walker.skip_children();
                        stats.skip(
                            relative,
                            SkipReason::Ignored {
                                pattern: pattern.to_string(),
                            },
                        );
                        continue;
                    }
                    writer.create_dir(&relative)?;
                    stats.containers_created += 1;
                }
                NodeKind::Leaf { language: None } => {
                    warn!(path = %entry.node.path, "skipping leaf with unrecognized language");
                    stats.skip(relative, SkipReason::UnrecognizedLanguage);
                }
                NodeKind::Leaf {
                    language: Some(language),
                } => {
                    let local_relative = format!("{}.{}", relative, language.to_extension());
                    if let Some(pattern) = self.policy.ignored_by(&local_relative) {
                        stats.skip(
                            local_relative,
                            SkipReason::Ignored {
                                pattern: pattern.to_string(),
                            },
                        );
                        continue;
                    }

                    let transport = self.remote.fetch_content(&entry.node.path).await?;
                    let raw = ContentCodec::decode(&transport).map_err(|source| {
                        SyncError::Codec {
                            path: entry.node.path.clone(),
                            source,
                        }
                    })?;

                    let size = raw.len() as u64;
                    if let Some(reason) = self.policy.evaluate(&local_relative, size).skip_reason() {
                        stats.skip(local_relative, reason);
                        continue;
                    }

                    writer.write_file(&local_relative, &raw)?;
                    stats.leaves_written += 1;
                    stats.bytes_transferred += size;
                }
            }
        }

        Ok(finish(stats))
    }

    // -----------------------------------------------------------------------
    // Local -> remote
    // -----------------------------------------------------------------------

    /// Mirror the local root into the remote root.
    ///
    /// Files are pushed to `relative_path` minus its last extension, tagged
    /// with the language that extension maps to. Other files and symlinks are
    /// skipped and recorded in the stats.
    #[instrument(skip(self), fields(local = %self.root.local_base().display(), remote = %self.root.remote_base()))]
    pub async fn upload(&self, overwrite: bool) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats::new(SyncDirection::Upload);
        let local_base = self.root.local_base();
        let remote_base = self.root.remote_base();

        let metadata =
            std::fs::metadata(local_base).map_err(|e| SyncError::local_io(local_base, e))?;
        if !metadata.is_dir() {
            return Err(SyncError::local_io(
                local_base,
                std::io::Error::other("source root is not a directory"),
            ));
        }

        let destination = RemoteDestination::new(&self.remote, remote_base);
        let decision = ExistenceGuard::new(overwrite).check(&destination).await?;
        stats.cleared_destination = decision == OverwriteDecision::ProceedAfterClear;

        self.remote.create_container(remote_base).await?;

        let mut walker = LocalTreeWalker::new(local_base);
        while let Some(entry) = walker.next() {
            let entry = entry?;
            let relative = entry.relative_path;

            if let Some(pattern) = self.policy.ignored_by(&relative) {
                if entry.node.kind == LocalKind::Directory {
                    walker.skip_children();
                }
                stats.skip(
                    relative,
                    SkipReason::Ignored {
                        pattern: pattern.to_string(),
                    },
                );
                continue;
            }

            match entry.node.kind {
                LocalKind::Symlink => {
                    debug!(path = %relative, "skipping symlink");
                    stats.skip(relative, SkipReason::Symlink);
                }
                LocalKind::Directory => {
                    self.remote
                        .create_container(&join_remote(remote_base, &relative))
                        .await?;
                    stats.containers_created += 1;
                }
                LocalKind::File => {
                    let Some((target, language)) = split_language(&relative) else {
                        debug!(path = %relative, "skipping file with unrecognized extension");
                        stats.skip(relative, SkipReason::UnrecognizedExtension);
                        continue;
                    };

                    let raw = read_file(&entry.node.path)?;
                    let size = raw.len() as u64;
                    if let Some(reason) = self.policy.evaluate(&relative, size).skip_reason() {
                        stats.skip(relative, reason);
                        continue;
                    }

                    let encoded = ContentCodec::encode(&raw);
                    self.remote
                        .push_content(&join_remote(remote_base, &target), language, &encoded)
                        .await?;
                    stats.leaves_written += 1;
                    stats.bytes_transferred += size;
                }
            }
        }

        Ok(finish(stats))
    }
}

fn finish(mut stats: SyncStats) -> SyncStats {
    stats.completed_at = Some(Utc::now());
    info!(
        direction = %stats.direction,
        containers = stats.containers_created,
        leaves = stats.leaves_written,
        bytes = stats.bytes_transferred,
        skipped = stats.skipped.len(),
        "sync completed"
    );
    stats
}

/// Split `dir/name.ext` into `dir/name` and the language of `ext`.
///
/// Only the last extension is stripped. Names without a stem (`.py`) have no
/// extension.
fn split_language(relative: &str) -> Option<(String, LanguageTag)> {
    let (parent, name) = match relative.rsplit_once('/') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, relative),
    };
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let language = LanguageTag::from_extension(ext)?;
    let target = match parent {
        Some(parent) => format!("{}/{}", parent, stem),
        None => stem.to_string(),
    };
    Some((target, language))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{InMemoryWorkspace, RemoteOp};

    #[test]
    fn test_split_language() {
        assert_eq!(
            split_language("a.py"),
            Some(("a".to_string(), LanguageTag::Python))
        );
        assert_eq!(
            split_language("sub/b.sql"),
            Some(("sub/b".to_string(), LanguageTag::Sql))
        );
        assert_eq!(
            split_language("x/archive.tar.scala"),
            Some(("x/archive.tar".to_string(), LanguageTag::Scala))
        );
        assert_eq!(split_language("notes.txt"), None);
        assert_eq!(split_language("Makefile"), None);
        assert_eq!(split_language(".py"), None);
        assert_eq!(split_language("upper.R"), None);
    }

    #[tokio::test]
    async fn test_download_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SyncEngine::new(
            InMemoryWorkspace::new(),
            SyncRoot::new(dir.path().join("nb"), "/root"),
            FilePolicy::default(),
        );
        let err = engine.download().await.unwrap_err();
        assert!(matches!(err, SyncError::SourceMissing { ref source_root } if source_root == "/root"));
        assert!(!dir.path().join("nb").exists());
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SyncEngine::new(
            InMemoryWorkspace::new(),
            SyncRoot::new(dir.path().join("nope"), "/root"),
            FilePolicy::default(),
        );
        let err = engine.upload(false).await.unwrap_err();
        assert!(matches!(err, SyncError::LocalIo { .. }));
        assert_eq!(engine.remote().calls().len(), 0);
    }

    #[tokio::test]
    async fn test_download_ignores_pattern_and_oversize() {
        let dir = tempfile::tempdir().unwrap();
        let ws = InMemoryWorkspace::new()
            .with_leaf("/root/keep", Some(LanguageTag::Python), b"ok")
            .with_leaf("/root/big", Some(LanguageTag::Sql), &[b'x'; 64])
            .with_leaf("/root/scratch/tmp", Some(LanguageTag::R), b"no");
        let engine = SyncEngine::new(
            ws,
            SyncRoot::new(dir.path().join("nb"), "/root"),
            FilePolicy::new(16, vec!["scratch".into()]),
        );

        let stats = engine.download().await.unwrap();
        assert_eq!(stats.leaves_written, 1);
        assert_eq!(stats.skipped.len(), 2);
        assert!(dir.path().join("nb/keep.py").exists());
        assert!(!dir.path().join("nb/big.sql").exists());
        assert!(!dir.path().join("nb/scratch").exists());
        assert!(!engine
            .remote()
            .calls()
            .iter()
            .any(|c| c.op == RemoteOp::List && c.path == "/root/scratch"));
    }

    #[tokio::test]
    async fn test_upload_skips_ignored_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nb = dir.path().join("nb");
        std::fs::create_dir_all(nb.join(".ipynb_checkpoints")).unwrap();
        std::fs::write(nb.join(".ipynb_checkpoints/a-checkpoint.py"), "x").unwrap();
        std::fs::write(nb.join("a.py"), "a").unwrap();

        let engine = SyncEngine::new(
            InMemoryWorkspace::new(),
            SyncRoot::new(&nb, "/root"),
            FilePolicy::new(0, vec![".ipynb_checkpoints".into()]),
        );
        let stats = engine.upload(false).await.unwrap();
        assert_eq!(stats.leaves_written, 1);
        assert_eq!(stats.containers_created, 0);
        assert_eq!(
            engine.remote().paths_under("/root"),
            vec!["/root".to_string(), "/root/a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_download_invalid_transport_content_is_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = InMemoryWorkspace::new()
            .with_leaf("/root/a", Some(LanguageTag::Python), b"ok")
            .with_transport_leaf("/root/b", Some(LanguageTag::Sql), "not base64!");
        let engine = SyncEngine::new(
            ws,
            SyncRoot::new(dir.path().join("nb"), "/root"),
            FilePolicy::default(),
        );

        let err = engine.download().await.unwrap_err();
        assert!(matches!(err, SyncError::Codec { ref path, .. } if path == "/root/b"));
        assert!(dir.path().join("nb/a.py").exists());
        assert!(!dir.path().join("nb/b.sql").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_records_symlink_without_following() {
        let dir = tempfile::tempdir().unwrap();
        let nb = dir.path().join("nb");
        std::fs::create_dir_all(&nb).unwrap();
        std::fs::write(nb.join("a.py"), "a").unwrap();
        std::os::unix::fs::symlink(&nb, nb.join("loop")).unwrap();

        let engine = SyncEngine::new(
            InMemoryWorkspace::new(),
            SyncRoot::new(&nb, "/root"),
            FilePolicy::default(),
        );
        let stats = engine.upload(false).await.unwrap();
        assert_eq!(stats.leaves_written, 1);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].relative_path, "loop");
        assert_eq!(stats.skipped[0].reason, SkipReason::Symlink);
    }
}
