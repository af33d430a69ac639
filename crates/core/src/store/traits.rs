//! Trait definitions for the artifact store.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::error::StoreError;
use super::naming::derive_input_name;
use super::types::{ArtifactRef, CleanupReport};

/// Staging area for job inputs and outputs.
///
/// Artifacts are immutable: they are created once and later deleted, never
/// rewritten in place.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Local filesystem path backing an artifact (handed to the executable).
    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf;

    /// Writes an input artifact under an already-derived unique name.
    async fn write_input(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef, StoreError>;

    /// Stages an upload under a name derived from the current time and the
    /// sanitized original file name.
    async fn stage_input(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> Result<ArtifactRef, StoreError> {
        self.write_input(&derive_input_name(original_name), bytes)
            .await
    }

    /// Output location for an input. Deterministic; nothing is written.
    fn reserve_output(&self, input: &ArtifactRef) -> ArtifactRef {
        ArtifactRef::output_for(input)
    }

    /// Reads an artifact. `Ok(None)` means it is not (yet) there.
    async fn retrieve(&self, artifact: &ArtifactRef) -> Result<Option<Vec<u8>>, StoreError>;

    /// Size of an artifact if it exists, without reading its contents.
    async fn exists(&self, artifact: &ArtifactRef) -> Result<Option<u64>, StoreError>;

    /// Deletes an artifact. Returns `false` if it was already gone.
    async fn remove(&self, artifact: &ArtifactRef) -> Result<bool, StoreError>;

    /// Deletes the given artifacts after `after`, in the background.
    ///
    /// Failures are logged and never reported to the caller.
    fn schedule_cleanup(&self, artifacts: Vec<ArtifactRef>, after: Duration)
        -> JoinHandle<CleanupReport>;

    /// Deletes every artifact older than `max_age`.
    async fn sweep_expired(&self, max_age: Duration) -> Result<CleanupReport, StoreError>;

    /// Ensures the store is ready (directories exist and are writable).
    async fn validate(&self) -> Result<(), StoreError>;
}
