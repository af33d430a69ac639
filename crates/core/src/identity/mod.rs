mod forwarded;
mod peer;
mod traits;
mod types;

pub use forwarded::*;
pub use peer::*;
pub use traits::*;
pub use types::*;

use crate::config::RateLimitConfig;

/// Factory function to create the client identifier from config
pub fn create_identifier(config: &RateLimitConfig) -> Box<dyn ClientIdentifier> {
    if config.trust_forwarded_for {
        Box::new(ForwardedForIdentifier::new())
    } else {
        Box::new(PeerAddressIdentifier::new())
    }
}
