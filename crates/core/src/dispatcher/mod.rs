//! Job dispatcher.
//!
//! A submission is validated against the transform registry, admitted by the
//! per-client rate limiter, waits for a slot in the bounded execution pool,
//! is staged in the artifact store and finally run by the invoker. Nothing is
//! written before admission, and artifacts are only scheduled for cleanup
//! once the job is terminal.

mod dispatcher;
mod error;
mod registry;
mod types;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DispatchError, PROCESSING_FAILED, PROCESSING_TIMED_OUT};
pub use registry::TransformRegistry;
pub use types::{ErrorBody, Job, JobReceipt, JobStatus, PoolStatus, SubmitRequest, TransitionError};
