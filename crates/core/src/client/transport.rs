//! Upload transports.
//!
//! The orchestrator tries an ordered list of transports. Each turns an
//! [`UploadRequest`] into a [`TransportResponse`]; any HTTP status counts as a
//! response. Only failures to get a response at all are [`TransportError`]s,
//! and only those move the orchestrator on to the next transport.

use async_trait::async_trait;
use futures::stream;
use reqwest::header::RETRY_AFTER;
use reqwest::{multipart, Body, Client};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::progress::UploadProgress;

/// Header carrying the caller's identity on credentialed requests.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

pub type ProgressSender = mpsc::UnboundedSender<UploadProgress>;

/// What gets uploaded.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub transform: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

impl UploadRequest {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Any HTTP response, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<u64>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No response was obtained.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// One strategy for delivering an upload.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the name of this transport.
    fn name(&self) -> &str;

    /// Sends the upload, reporting body progress on `progress`.
    async fn send(
        &self,
        request: &UploadRequest,
        progress: ProgressSender,
    ) -> Result<TransportResponse, TransportError>;
}

/// Existence check for a published artifact.
#[async_trait]
pub trait ResultProbe: Send + Sync {
    /// Whether `path` (e.g. `results/output-1-a.jpg`) is retrievable.
    async fn is_visible(&self, path: &str) -> Result<bool, TransportError>;
}

fn build_client(with_credentials: bool) -> Result<Client, TransportError> {
    Client::builder()
        .cookie_store(with_credentials)
        .build()
        .map_err(|e| TransportError::Unavailable(e.to_string()))
}

async fn into_response(response: reqwest::Response) -> Result<TransportResponse, TransportError> {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let body = response.text().await?;
    Ok(TransportResponse {
        status,
        body,
        retry_after,
    })
}

/// Streaming multipart upload to `POST /api/process`.
pub struct StreamingTransport {
    client: Client,
    endpoint: String,
    with_credentials: bool,
    client_id: Option<String>,
    chunk_size: usize,
}

impl StreamingTransport {
    pub fn new(
        base_url: &str,
        with_credentials: bool,
        client_id: Option<String>,
        chunk_size: usize,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(with_credentials)?,
            endpoint: format!("{}/api/process", base_url.trim_end_matches('/')),
            with_credentials,
            client_id,
            chunk_size: chunk_size.max(1),
        })
    }

    fn body(&self, request: &UploadRequest, progress: ProgressSender) -> Body {
        let total = request.len();
        let chunks: Vec<Vec<u8>> = request
            .bytes
            .chunks(self.chunk_size)
            .map(<[u8]>::to_vec)
            .collect();

        let mut sent = 0u64;
        let stream = stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            let _ = progress.send(UploadProgress::new(sent, total));
            Ok::<_, std::io::Error>(chunk)
        }));
        Body::wrap_stream(stream)
    }
}

#[async_trait]
impl Transport for StreamingTransport {
    fn name(&self) -> &str {
        if self.with_credentials {
            "streaming"
        } else {
            "streaming-anonymous"
        }
    }

    async fn send(
        &self,
        request: &UploadRequest,
        progress: ProgressSender,
    ) -> Result<TransportResponse, TransportError> {
        let part = multipart::Part::stream_with_length(self.body(request, progress), request.len())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)?;
        let form = multipart::Form::new()
            .text("transform", request.transform.clone())
            .part("image", part);

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        if self.with_credentials {
            if let Some(id) = &self.client_id {
                builder = builder.header(CLIENT_ID_HEADER, id);
            }
        }

        debug!(transport = self.name(), endpoint = %self.endpoint, "Sending upload");
        let response = builder.send().await?;
        into_response(response).await
    }
}

/// Buffered upload to the path-form endpoint `POST /api/transforms/{name}`.
pub struct BufferedTransport {
    client: Client,
    base_url: String,
}

impl BufferedTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(false)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, transform: &str) -> String {
        format!(
            "{}/api/transforms/{}",
            self.base_url,
            urlencoding::encode(transform)
        )
    }
}

#[async_trait]
impl Transport for BufferedTransport {
    fn name(&self) -> &str {
        "buffered"
    }

    async fn send(
        &self,
        request: &UploadRequest,
        progress: ProgressSender,
    ) -> Result<TransportResponse, TransportError> {
        let total = request.len();
        let _ = progress.send(UploadProgress::new(0, total));

        let part = multipart::Part::bytes(request.bytes.as_ref().clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)?;
        let form = multipart::Form::new().part("image", part);

        let endpoint = self.endpoint(&request.transform);
        debug!(transport = self.name(), endpoint = %endpoint, "Sending upload");
        let response = self.client.post(&endpoint).multipart(form).send().await?;
        let _ = progress.send(UploadProgress::new(total, total));
        into_response(response).await
    }
}

/// `HEAD` probe against the retrieval surface.
pub struct HttpResultProbe {
    client: Client,
    base_url: String,
}

impl HttpResultProbe {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(false)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ResultProbe for HttpResultProbe {
    async fn is_visible(&self, path: &str) -> Result<bool, TransportError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.client.head(&url).send().await?;
        Ok(response.status().is_success())
    }
}
