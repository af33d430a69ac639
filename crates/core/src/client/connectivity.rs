//! Pre-flight connectivity check.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::debug;

/// Answers whether the service is reachable at all.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Resolves the service host; no resolution means offline.
#[derive(Debug, Clone)]
pub struct ResolverProbe {
    authority: String,
    timeout: Duration,
}

impl ResolverProbe {
    pub fn new(authority: impl Into<String>, timeout: Duration) -> Self {
        Self {
            authority: authority.into(),
            timeout,
        }
    }

    /// Builds a probe for the host and port of `base_url`.
    pub fn for_url(base_url: &str, timeout: Duration) -> Option<Self> {
        let url = reqwest::Url::parse(base_url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        // IPv6 hosts come back bracketed
        Some(Self::new(format!("{host}:{port}"), timeout))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }
}

#[async_trait]
impl ConnectivityProbe for ResolverProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, lookup_host(self.authority.as_str())).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                debug!(authority = %self.authority, error = %e, "Host did not resolve");
                false
            }
            Err(_) => false,
        }
    }
}

/// Probe that always reports online.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

#[async_trait]
impl ConnectivityProbe for AssumeOnline {
    async fn is_online(&self) -> bool {
        true
    }
}
