//! Projection of upload progress onto a single percentage.
//!
//! The upload covers 0..=80; once the body is sent the job is assumed to be
//! at 90 until the response arrives, and 100 means the result is ready.

/// Top of the upload range.
pub const UPLOAD_CEILING: u8 = 80;
/// Shown while the server processes the upload.
pub const PROCESSING_ESTIMATE: u8 = 90;
pub const COMPLETE: u8 = 100;

/// Bytes of the request body handed to the network so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn new(sent: u64, total: u64) -> Self {
        Self { sent, total }
    }

    pub fn is_done(&self) -> bool {
        self.sent >= self.total
    }
}

/// Maps upload bytes onto `0..=UPLOAD_CEILING`.
pub fn upload_percent(progress: UploadProgress) -> u8 {
    if progress.total == 0 {
        return UPLOAD_CEILING;
    }
    let sent = progress.sent.min(progress.total) as u128;
    (sent * UPLOAD_CEILING as u128 / progress.total as u128) as u8
}

/// Keeps the published percentage from ever moving backwards.
#[derive(Debug, Default)]
pub struct ProgressProjection {
    current: u8,
}

impl ProgressProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Raises the projection to `percent` if higher; returns the result.
    pub fn advance(&mut self, percent: u8) -> u8 {
        self.current = self.current.max(percent.min(COMPLETE));
        self.current
    }

    pub fn on_upload(&mut self, progress: UploadProgress) -> u8 {
        self.advance(upload_percent(progress))
    }
}
