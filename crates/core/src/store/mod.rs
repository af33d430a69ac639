//! Artifact store for job inputs and outputs.
//!
//! Inputs are staged under `uploads/` with a unique, sanitized name; outputs
//! are written by the transform executable under `results/` at a location
//! derived from the input name. Artifacts are write-once and are removed
//! after a retention period, either by a scheduled cleanup or by the periodic
//! sweep.

mod error;
mod fs_store;
mod naming;
mod traits;
mod types;

pub use error::StoreError;
pub use fs_store::FsArtifactStore;
pub use naming::{derive_input_name, is_safe_name, next_stamp, sanitize_filename};
pub use traits::ArtifactStore;
pub use types::{Artifact, ArtifactKind, ArtifactRef, CleanupReport, OUTPUT_PREFIX};
