//! Trait definitions for the process invoker.

use async_trait::async_trait;
use std::time::Duration;

use super::error::InvokerError;
use super::types::{InvocationOutcome, InvocationRequest};

/// Runs the external transform executable.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Returns the name of this invoker implementation.
    fn name(&self) -> &str;

    /// Wall-clock limit applied to each invocation.
    fn timeout(&self) -> Duration;

    /// Runs one transform to completion, failure or timeout.
    async fn execute(&self, request: &InvocationRequest)
        -> Result<InvocationOutcome, InvokerError>;
}
