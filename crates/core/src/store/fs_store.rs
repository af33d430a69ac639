//! File system artifact store implementation.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::naming::is_safe_name;
use super::traits::ArtifactStore;
use super::types::{ArtifactKind, ArtifactRef, CleanupReport};
use crate::metrics;

/// Artifact store backed by two directories under a common root:
/// `uploads/` for inputs and `results/` for outputs.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. Directories are created by
    /// [`ArtifactStore::validate`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_of(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.namespace())
    }

    fn checked_path(&self, artifact: &ArtifactRef) -> Result<PathBuf, StoreError> {
        if !is_safe_name(&artifact.name) {
            return Err(StoreError::InvalidName(artifact.name.clone()));
        }
        Ok(self.path_of(artifact))
    }
}

/// Deletes a file, treating absence as success.
async fn remove_file(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn remove_all(paths: Vec<PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        match remove_file(&path).await {
            Ok(true) => report.removed += 1,
            Ok(false) => report.already_gone += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Artifact cleanup failed");
                metrics::CLEANUP_FAILURES.inc();
                report.errors.push(e.to_string());
            }
        }
    }
    report
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        self.dir_of(artifact.kind).join(&artifact.name)
    }

    async fn write_input(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef, StoreError> {
        let artifact = ArtifactRef::input(name);
        let path = self.checked_path(&artifact)?;

        // create_new: an existing artifact is never overwritten
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists { path: path.clone() }
                } else {
                    StoreError::write_failed(path.clone(), e)
                }
            })?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = remove_file(&path).await;
            return Err(StoreError::write_failed(path, e));
        }

        debug!(artifact = %artifact, size = bytes.len(), "Staged input artifact");
        Ok(artifact)
    }

    async fn retrieve(&self, artifact: &ArtifactRef) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.checked_path(artifact)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed { path, source: e }),
        }
    }

    async fn exists(&self, artifact: &ArtifactRef) -> Result<Option<u64>, StoreError> {
        let path = self.checked_path(artifact)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed { path, source: e }),
        }
    }

    async fn remove(&self, artifact: &ArtifactRef) -> Result<bool, StoreError> {
        let path = self.checked_path(artifact)?;
        remove_file(&path).await
    }

    fn schedule_cleanup(
        &self,
        artifacts: Vec<ArtifactRef>,
        after: Duration,
    ) -> JoinHandle<CleanupReport> {
        let paths: Vec<PathBuf> = artifacts
            .iter()
            .filter(|a| is_safe_name(&a.name))
            .map(|a| self.path_of(a))
            .collect();

        tokio::spawn(async move {
            if !after.is_zero() {
                tokio::time::sleep(after).await;
            }
            let report = remove_all(paths).await;
            debug!(
                removed = report.removed,
                already_gone = report.already_gone,
                "Scheduled cleanup finished"
            );
            report
        })
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<CleanupReport, StoreError> {
        let now = SystemTime::now();
        let mut expired = Vec::new();

        for kind in [ArtifactKind::Input, ArtifactKind::Output] {
            let dir = self.dir_of(kind);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let meta = match entry.metadata().await {
                    Ok(meta) if meta.is_file() => meta,
                    _ => continue,
                };
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .unwrap_or_default();
                if age >= max_age {
                    expired.push(entry.path());
                }
            }
        }

        let report = remove_all(expired).await;
        if report.removed > 0 {
            metrics::ARTIFACTS_SWEPT.inc_by(report.removed as u64);
            info!(removed = report.removed, "Swept expired artifacts");
        }
        Ok(report)
    }

    async fn validate(&self) -> Result<(), StoreError> {
        for kind in [ArtifactKind::Input, ArtifactKind::Output] {
            let dir = self.dir_of(kind);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::DirectoryCreationFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }
}
