use super::{ClientId, ClientIdentifier, ClientRequest};

/// Identifies clients by the socket peer address.
pub struct PeerAddressIdentifier;

impl PeerAddressIdentifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PeerAddressIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdentifier for PeerAddressIdentifier {
    fn identify(&self, request: &ClientRequest) -> ClientId {
        request
            .peer_ip
            .map(ClientId::from)
            .unwrap_or_else(ClientId::unknown)
    }

    fn method_name(&self) -> &'static str {
        "peer_address"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_peer_identifier_uses_socket_address() {
        let request = ClientRequest {
            headers: HashMap::from([("x-forwarded-for".to_string(), "1.2.3.4".to_string())]),
            peer_ip: Some("192.168.1.20".parse().unwrap()),
        };
        let id = PeerAddressIdentifier::new().identify(&request);
        assert_eq!(id.as_str(), "192.168.1.20");
    }

    #[test]
    fn test_peer_identifier_without_address() {
        let request = ClientRequest {
            headers: HashMap::new(),
            peer_ip: None,
        };
        assert_eq!(PeerAddressIdentifier::new().identify(&request), ClientId::unknown());
    }
}
