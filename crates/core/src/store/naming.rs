//! Artifact naming.
//!
//! Input names are `<millis>-<sanitized original name>`. The millisecond stamp
//! comes from a process-wide monotonic counter: two uploads landing in the
//! same millisecond get consecutive stamps, so names never collide within a
//! process.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

const MAX_NAME_LEN: usize = 120;
const FALLBACK_NAME: &str = "upload";

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Next unique millisecond stamp: the wall clock, bumped past the last issued
/// stamp when necessary.
pub fn next_stamp() -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, leading dots are stripped and the result is length-limited.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let limited = if trimmed.len() > MAX_NAME_LEN {
        // keep the extension when truncating
        match trimmed.rfind('.') {
            Some(dot) if trimmed.len() - dot <= 10 => {
                let ext = &trimmed[dot..];
                format!("{}{}", &trimmed[..MAX_NAME_LEN - ext.len()], ext)
            }
            _ => trimmed[..MAX_NAME_LEN].to_string(),
        }
    } else {
        trimmed.to_string()
    };

    if limited.is_empty() || limited.chars().all(|c| c == '_') {
        FALLBACK_NAME.to_string()
    } else {
        limited
    }
}

/// Build a fresh input artifact name for an upload.
pub fn derive_input_name(original: &str) -> String {
    format!("{}-{}", next_stamp(), sanitize_filename(original))
}

/// Whether a name taken from a request can safely address an artifact.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN + 32
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
