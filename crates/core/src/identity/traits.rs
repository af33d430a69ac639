use super::types::{ClientId, ClientRequest};

/// Derives the rate-limit identity of a request from network information.
///
/// Client-reported values such as timestamps never feed into the identity.
pub trait ClientIdentifier: Send + Sync {
    fn identify(&self, request: &ClientRequest) -> ClientId;

    /// Name of this identification strategy
    fn method_name(&self) -> &'static str;
}
