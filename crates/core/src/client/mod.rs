//! Client orchestrator.
//!
//! Drives a submission from the caller's side: pre-flight checks, payload
//! normalization, an ordered chain of upload transports under a shared
//! inactivity budget, progress projection, and polling until the result is
//! visible on the retrieval surface. State changes are published on a watch
//! channel.

mod config;
mod connectivity;
mod error;
mod normalize;
mod orchestrator;
mod pacing;
mod progress;
mod retry;
mod state;
mod transport;

pub use config::ClientConfig;
pub use connectivity::{AssumeOnline, ConnectivityProbe, ResolverProbe};
pub use error::ClientError;
pub use normalize::{guess_content_type, normalize, NormalizeOptions, Payload};
pub use orchestrator::{Orchestrator, Submission, SubmissionResult};
pub use pacing::LocalPacer;
pub use progress::{
    upload_percent, ProgressProjection, UploadProgress, COMPLETE, PROCESSING_ESTIMATE,
    UPLOAD_CEILING,
};
pub use retry::{retry, RetryPolicy};
pub use state::{ClientStatus, SubmissionState};
pub use transport::{
    BufferedTransport, HttpResultProbe, ProgressSender, ResultProbe, StreamingTransport,
    Transport, TransportError, TransportResponse, UploadRequest, CLIENT_ID_HEADER,
};
