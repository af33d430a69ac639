//! Common test utilities for API testing with a mock invoker.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real filesystem store in a temporary directory and a
//! `MockInvoker` in place of the transform executable.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use detectr_core::testing::MockInvoker;
use detectr_core::{
    create_identifier, load_config_from_str, ArtifactStore, ClientIdentifier, Config,
    CooldownLimiter, Dispatcher, DispatcherConfig, FsArtifactStore, Invoker, TransformRegistry,
};
use detectr_server::{create_router, AppState};

pub const BOUNDARY: &str = "detectr-test-boundary";

/// Test fixture with an in-process router.
///
/// Clients are told apart by `X-Forwarded-For`, since requests sent with
/// `oneshot` carry no peer address.
pub struct TestFixture {
    pub router: Router,
    pub invoker: MockInvoker,
    pub store: Arc<dyn ArtifactStore>,
    pub config: Config,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct TestConfig {
    pub window_secs: u64,
    pub max_upload_bytes: usize,
    pub invoker: MockInvoker,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            window_secs: 30,
            max_upload_bytes: 1024 * 1024,
            invoker: MockInvoker::new(),
        }
    }
}

/// One multipart field.
pub enum Field<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(fields: &[Field<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match field {
            Field::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Field::File {
                name,
                file_name,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: image/jpeg\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A small stand-in for a JPEG upload.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend((0..len.saturating_sub(4)).map(|i| (i % 251) as u8));
    bytes
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = load_config_from_str(
            r#"
[executor]
executable_path = "/opt/detectr/operators"

[server]
host = "127.0.0.1"
port = 3001

[rate_limit]
trust_forwarded_for = true
"#,
        )
        .expect("Failed to parse test config");
        config.storage.root = temp_dir.path().join("data");
        config.rate_limit.window_secs = test_config.window_secs;
        config.server.max_upload_bytes = test_config.max_upload_bytes;

        let store = FsArtifactStore::new(&config.storage.root);
        store.validate().await.expect("Failed to prepare store");
        let store: Arc<dyn ArtifactStore> = Arc::new(store);

        let invoker = test_config.invoker;
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherConfig::from(&config),
            TransformRegistry::new(config.transforms.clone()),
            Arc::new(CooldownLimiter::from_secs(config.rate_limit.window_secs)),
            Arc::clone(&store),
            Arc::new(invoker.clone()) as Arc<dyn Invoker>,
        ));
        let identifier: Arc<dyn ClientIdentifier> =
            Arc::from(create_identifier(&config.rate_limit));

        let state = Arc::new(AppState::new(config.clone(), dispatcher, identifier));
        let router = create_router(state);

        Self {
            router,
            invoker,
            store,
            config,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("HEAD").uri(path), Body::empty())
            .await
    }

    /// Posts a multipart form as the client at `client_ip`.
    pub async fn submit(&self, path: &str, client_ip: &str, fields: &[Field<'_>]) -> TestResponse {
        let body = multipart_body(fields);
        let builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("X-Forwarded-For", client_ip)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("Content-Length", body.len());
        self.send(builder, Body::from(body)).await
    }

    /// Submits `image.jpg` for `transform` through `POST /api/process`.
    pub async fn submit_image(&self, client_ip: &str, transform: &str, image: &[u8]) -> TestResponse {
        self.submit(
            "/api/process",
            client_ip,
            &[
                Field::Text("transform", transform),
                Field::File {
                    name: "image",
                    file_name: "image.jpg",
                    bytes: image,
                },
            ],
        )
        .await
    }

    pub async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }

    /// Number of files currently staged under `uploads/`.
    pub fn staged_inputs(&self) -> usize {
        std::fs::read_dir(self.config.storage.root.join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
