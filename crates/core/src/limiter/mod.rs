//! Per-client submission throttling.
//!
//! A client may start a new job only once its own cooldown window has passed
//! since its last accepted submission. This is the authoritative check; any
//! pacing a client performs locally is advisory.

mod cooldown;

pub use cooldown::{Admission, CooldownLimiter, LimiterStatus};
