//! Bounded capture of process output streams.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Keeps the last `limit` bytes written to it.
#[derive(Debug)]
pub struct CaptureBuffer {
    limit: usize,
    data: Vec<u8>,
    dropped: usize,
}

impl CaptureBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            data: Vec::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        if self.data.len() > self.limit {
            let excess = self.data.len() - self.limit;
            self.data.drain(..excess);
            self.dropped += excess;
        }
    }

    /// Bytes discarded from the front so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Captured text, prefixed with a marker when the head was discarded.
    pub fn render(&self) -> String {
        let text = String::from_utf8_lossy(&self.data);
        if self.dropped > 0 {
            format!("[... truncated {} bytes ...]\n{}", self.dropped, text)
        } else {
            text.into_owned()
        }
    }
}

pub type SharedCapture = Arc<Mutex<CaptureBuffer>>;

/// Reads `stream` to EOF into a shared buffer.
///
/// The buffer is shared so whatever was read stays available even if the
/// reader has to be abandoned.
pub async fn drain_into<R>(mut stream: R, buffer: SharedCapture)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut guard) = buffer.lock() {
                    guard.push(&chunk[..n]);
                }
            }
        }
    }
}

pub fn render(buffer: &SharedCapture) -> String {
    buffer.lock().map(|b| b.render()).unwrap_or_default()
}
