//! Process invoker for the external transform executable.
//!
//! The executable is started with exactly three positional arguments
//! (transform argument, input path, output path) and never through a shell.
//! Its output streams are captured concurrently into bounded buffers. A run
//! that exceeds the configured timeout is killed and its partial output
//! removed.

mod capture;
mod error;
mod external;
mod traits;
mod types;

pub use capture::CaptureBuffer;
pub use error::InvokerError;
pub use external::ExternalInvoker;
pub use traits::Invoker;
pub use types::{InvocationOutcome, InvocationRequest};
