//! Mock transport, result probe and connectivity probe for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::client::{
    ConnectivityProbe, ProgressSender, ResultProbe, Transport, TransportError, TransportResponse,
    UploadProgress, UploadRequest,
};
use crate::dispatcher::{ErrorBody, JobReceipt};

/// What the mock does on its next `send`.
#[derive(Debug, Clone)]
pub enum TransportScript {
    /// Report the whole body as sent, then answer with this response.
    Respond(TransportResponse),
    /// Fail without a response.
    Fail(String),
    /// Report the whole body as sent, then drop the connection.
    FailAfterUpload(String),
    /// Report half the body as sent, then never finish.
    Hang,
}

impl TransportScript {
    /// 200 with a serialized receipt.
    pub fn receipt(receipt: &JobReceipt) -> Self {
        Self::Respond(TransportResponse {
            status: 200,
            body: serde_json::to_string(receipt).unwrap_or_default(),
            retry_after: None,
        })
    }

    /// Error response with a JSON body.
    pub fn error(status: u16, body: ErrorBody) -> Self {
        Self::Respond(TransportResponse {
            status,
            retry_after: body.retry_after_seconds,
            body: serde_json::to_string(&body).unwrap_or_default(),
        })
    }
}

/// Mock implementation of the Transport and ResultProbe traits.
///
/// Scripts are consumed one per `send`; when they run out the mock fails
/// with a transport error.
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    scripts: Mutex<VecDeque<TransportScript>>,
    sends: AtomicUsize,
    visible: AtomicBool,
    probes: AtomicUsize,
}

impl MockTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scripts: Mutex::new(VecDeque::new()),
            sends: AtomicUsize::new(0),
            visible: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
        }
    }

    /// Queue behavior for a future `send`.
    pub fn push(&self, script: TransportScript) -> &Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(script);
        }
        self
    }

    pub fn with_script(self, script: TransportScript) -> Self {
        self.push(script);
        self
    }

    /// Whether the result probe reports artifacts as present.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: &UploadRequest,
        progress: ProgressSender,
    ) -> Result<TransportResponse, TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.pop_front());

        let total = request.len();
        match script {
            Some(TransportScript::Respond(response)) => {
                for quarter in 1..=4u64 {
                    let _ = progress.send(UploadProgress::new(total * quarter / 4, total));
                    tokio::task::yield_now().await;
                }
                Ok(response)
            }
            Some(TransportScript::Fail(reason)) => Err(TransportError::Connect(reason)),
            Some(TransportScript::FailAfterUpload(reason)) => {
                let _ = progress.send(UploadProgress::new(total, total));
                tokio::task::yield_now().await;
                Err(TransportError::Request(reason))
            }
            Some(TransportScript::Hang) => {
                let _ = progress.send(UploadProgress::new(total / 2, total));
                futures::future::pending::<()>().await;
                Err(TransportError::Request("unreachable".to_string()))
            }
            None => Err(TransportError::Unavailable(format!(
                "{}: no scripted response",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl ResultProbe for MockTransport {
    async fn is_visible(&self, _path: &str) -> Result<bool, TransportError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.visible.load(Ordering::SeqCst))
    }
}

/// Connectivity probe with a fixed answer.
#[derive(Debug)]
pub struct MockConnectivity {
    online: AtomicBool,
}

impl MockConnectivity {
    pub fn online() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            online: AtomicBool::new(false),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for MockConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
