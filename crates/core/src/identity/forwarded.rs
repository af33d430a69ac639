//! Proxy-aware client identification.

use std::net::IpAddr;

use super::{ClientId, ClientIdentifier, ClientRequest};

/// Identifies clients by the address a trusted reverse proxy reports.
///
/// Checks, in order:
/// - first hop of `X-Forwarded-For`
/// - `X-Real-IP`
/// - the socket peer address
///
/// Header values that do not parse as an IP address are ignored, so a client
/// cannot pick an arbitrary identity string.
pub struct ForwardedForIdentifier;

impl ForwardedForIdentifier {
    pub fn new() -> Self {
        Self
    }

    fn forwarded_ip(request: &ClientRequest) -> Option<IpAddr> {
        if let Some(value) = request.header("x-forwarded-for") {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }

        request
            .header("x-real-ip")
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    }
}

impl Default for ForwardedForIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdentifier for ForwardedForIdentifier {
    fn identify(&self, request: &ClientRequest) -> ClientId {
        Self::forwarded_ip(request)
            .or(request.peer_ip)
            .map(ClientId::from)
            .unwrap_or_else(ClientId::unknown)
    }

    fn method_name(&self) -> &'static str {
        "forwarded_for"
    }
}
