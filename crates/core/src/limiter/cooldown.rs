//! Sliding cooldown limiter keyed by client identity.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::identity::ClientId;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Whole seconds until the client may retry; 0 when allowed.
    pub retry_after_secs: u64,
}

impl Admission {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    fn rejected(remaining: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_secs: remaining.as_secs().max(1),
        }
    }
}

/// Snapshot of the limiter for status reporting.
#[derive(Debug, Clone)]
pub struct LimiterStatus {
    pub window_secs: u64,
    pub tracked_clients: usize,
}

/// Cooldown limiter: one record per client, overwritten on each accepted
/// submission.
///
/// The check and the record write happen under one write lock, so concurrent
/// checks for the same client are serialized and only the first one inside a
/// window is allowed.
pub struct CooldownLimiter {
    window: Duration,
    last_accepted: RwLock<HashMap<ClientId, Instant>>,
}

impl CooldownLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_secs(window_secs: u64) -> Self {
        Self::new(Duration::from_secs(window_secs))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check whether `client` may submit now, recording the submission if so.
    pub async fn admit(&self, client: &ClientId) -> Admission {
        let now = Instant::now();
        let mut records = self.last_accepted.write().await;

        if let Some(last) = records.get(client) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                return Admission::rejected(self.window - elapsed);
            }
        }

        records.insert(client.clone(), now);
        Admission::allowed()
    }

    /// Time left before `client` may submit again, without recording anything.
    pub async fn remaining(&self, client: &ClientId) -> Option<Duration> {
        let records = self.last_accepted.read().await;
        let last = records.get(client)?;
        let elapsed = Instant::now().saturating_duration_since(*last);
        (elapsed < self.window).then(|| self.window - elapsed)
    }

    /// Drop records whose window has passed. Returns how many were removed.
    ///
    /// An expired record admits exactly like a missing one, so pruning never
    /// changes an admission decision.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut records = self.last_accepted.write().await;
        let before = records.len();
        records.retain(|_, last| now.saturating_duration_since(*last) < self.window);
        before - records.len()
    }

    pub async fn status(&self) -> LimiterStatus {
        LimiterStatus {
            window_secs: self.window.as_secs(),
            tracked_clients: self.last_accepted.read().await.len(),
        }
    }
}
