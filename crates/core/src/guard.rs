//! Pre-flight existence check and overwrite policy.
//!
//! The guard runs exactly once per sync, before any writer. When it aborts,
//! nothing has been written or deleted on either side.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::errors::SyncError;
use crate::remote::RemoteWorkspace;

/// What to do with the destination root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    /// Destination absent: fresh copy.
    Proceed,
    /// Destination present and overwrite requested: clear it, then copy.
    ProceedAfterClear,
    /// Destination present and overwrite not requested.
    Abort,
}

impl OverwriteDecision {
    pub fn decide(destination_exists: bool, overwrite_requested: bool) -> Self {
        match (destination_exists, overwrite_requested) {
            (false, _) => Self::Proceed,
            (true, true) => Self::ProceedAfterClear,
            (true, false) => Self::Abort,
        }
    }
}

/// A destination root the guard can probe and clear.
#[async_trait]
pub trait SyncDestination: Send + Sync {
    /// Human-readable location for messages.
    fn describe(&self) -> String;

    /// `Ok(false)` only for a definite "does not exist"; any other probe
    /// failure is an error.
    async fn exists(&self) -> Result<bool, SyncError>;

    /// Recursively delete the destination root.
    async fn clear(&self) -> Result<(), SyncError>;
}

/// A remote subtree as a destination.
pub struct RemoteDestination<'a, R: RemoteWorkspace + ?Sized> {
    remote: &'a R,
    path: String,
}

impl<'a, R: RemoteWorkspace + ?Sized> RemoteDestination<'a, R> {
    pub fn new(remote: &'a R, path: impl Into<String>) -> Self {
        Self {
            remote,
            path: path.into(),
        }
    }
}

#[async_trait]
impl<'a, R: RemoteWorkspace + ?Sized> SyncDestination for RemoteDestination<'a, R> {
    fn describe(&self) -> String {
        self.path.clone()
    }

    async fn exists(&self) -> Result<bool, SyncError> {
        match self.remote.probe_existence(&self.path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), SyncError> {
        self.remote.delete_subtree(&self.path).await?;
        Ok(())
    }
}

/// Applies the overwrite policy to a destination.
#[derive(Debug, Clone, Copy)]
pub struct ExistenceGuard {
    overwrite: bool,
}

impl ExistenceGuard {
    pub fn new(overwrite: bool) -> Self {
        Self { overwrite }
    }

    /// Probe the destination and act on the decision.
    ///
    /// Returns `Proceed` or `ProceedAfterClear` (after the clear has
    /// completed). `Abort` is returned as [`SyncError::DestinationExists`].
    #[instrument(skip(self, destination), fields(destination = %destination.describe(), overwrite = self.overwrite))]
    pub async fn check<D: SyncDestination + ?Sized>(
        &self,
        destination: &D,
    ) -> Result<OverwriteDecision, SyncError> {
        let exists = destination.exists().await?;
        let decision = OverwriteDecision::decide(exists, self.overwrite);
        match decision {
            OverwriteDecision::Proceed => {
                info!("destination does not exist, starting fresh copy");
            }
            OverwriteDecision::ProceedAfterClear => {
                info!("deleting existing destination");
                destination.clear().await?;
            }
            OverwriteDecision::Abort => {
                warn!("destination exists and overwrite was not requested");
                return Err(SyncError::DestinationExists {
                    destination: destination.describe(),
                });
            }
        }
        Ok(decision)
    }
}
