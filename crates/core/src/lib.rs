//! nbsync core library.
//!
//! Mirrors a tree of notebooks between a local directory and a remote
//! workspace in either direction: configuration, branch discovery, the
//! remote workspace client, tree walkers on both sides, the overwrite guard
//! and the sync engine that ties them together.

pub mod codec;
pub mod config;
pub mod errors;
pub mod file_policy;
pub mod git;
pub mod guard;
pub mod language;
pub mod local;
pub mod models;
pub mod remote;
pub mod sync_engine;

// Re-exports for convenience.
pub use codec::ContentCodec;
pub use config::AppConfig;
pub use errors::{CoreError, RemoteError, SyncError};
pub use file_policy::FilePolicy;
pub use guard::{ExistenceGuard, OverwriteDecision};
pub use language::LanguageTag;
pub use models::{SyncRoot, SyncStats};
pub use remote::{InMemoryWorkspace, RemoteWorkspace, WorkspaceClient};
pub use sync_engine::SyncEngine;
