pub mod client;
pub mod config;
pub mod dispatcher;
pub mod identity;
pub mod invoker;
pub mod limiter;
pub mod metrics;
pub mod store;
pub mod testing;

pub use client::{ClientConfig, ClientError, ClientStatus, Orchestrator, Submission, SubmissionState};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatcher::{
    DispatchError, Dispatcher, DispatcherConfig, ErrorBody, JobReceipt, PoolStatus,
    SubmitRequest, TransformRegistry,
};
pub use identity::{create_identifier, ClientId, ClientIdentifier, ClientRequest};
pub use invoker::{ExternalInvoker, Invoker, InvokerError};
pub use limiter::CooldownLimiter;
pub use store::{ArtifactKind, ArtifactRef, ArtifactStore, FsArtifactStore, StoreError};
