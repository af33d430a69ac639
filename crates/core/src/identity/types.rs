use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Request information used to derive a client identity
#[derive(Debug, Clone)]
pub struct ClientRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub peer_ip: Option<IpAddr>,
}

impl ClientRequest {
    pub fn from_peer(peer_ip: IpAddr) -> Self {
        Self {
            headers: HashMap::new(),
            peer_ip: Some(peer_ip),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Stable token identifying a submitting caller for rate limiting.
///
/// Not an authenticated account: anyone sharing an address shares the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity used when no network information is available.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientId {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
