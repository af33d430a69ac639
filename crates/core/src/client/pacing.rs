//! Local advisory pacing.
//!
//! Mirrors the server's per-client cooldown so an impatient caller gets an
//! answer without a round trip. The server stays authoritative: a 429 from it
//! re-arms the pacer with the server's hint.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct LocalPacer {
    window: Duration,
    blocked_until: Mutex<Option<Instant>>,
}

impl LocalPacer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            blocked_until: Mutex::new(None),
        }
    }

    /// Seconds to wait before submitting, or `None` when clear.
    pub fn check(&self) -> Option<u64> {
        let guard = self.blocked_until.lock().ok()?;
        let until = (*guard)?;
        let remaining = until.checked_duration_since(Instant::now())?;
        if remaining.is_zero() {
            None
        } else {
            Some(remaining.as_secs().max(1))
        }
    }

    /// Starts a full window from now.
    pub fn record(&self) {
        self.block_for(self.window);
    }

    /// Blocks for the server's retry hint.
    pub fn rearm(&self, retry_after_secs: u64) {
        self.block_for(Duration::from_secs(retry_after_secs));
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.blocked_until.lock() {
            *guard = None;
        }
    }

    fn block_for(&self, duration: Duration) {
        if let Ok(mut guard) = self.blocked_until.lock() {
            *guard = Some(Instant::now() + duration);
        }
    }
}
