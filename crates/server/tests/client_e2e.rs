//! Client orchestrator end-to-end against a bound server.

mod common;

use std::net::SocketAddr;

use common::{jpeg_bytes, TestFixture};
use detectr_core::client::{ClientConfig, ClientError, Orchestrator, Submission, SubmissionState};

/// Serves the fixture's router on an ephemeral port.
async fn serve(fixture: &TestFixture) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let app = fixture.router.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .ok();
    });
    addr
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("http://{}", addr))
        .with_client_id("e2e")
        .with_inactivity_timeout(10)
        .with_visibility_delay(50)
}

#[tokio::test]
async fn test_submission_completes_and_result_is_downloadable() {
    let fixture = TestFixture::new().await;
    let addr = serve(&fixture).await;

    let orchestrator = Orchestrator::http(client_config(addr)).unwrap();
    let image = jpeg_bytes(10 * 1024);

    let result = orchestrator
        .submit(Submission::new("prewitt", "image.jpg", image.clone()))
        .await
        .unwrap();

    assert!(result.visible);
    assert_eq!(result.transport, "streaming");
    assert_eq!(
        result.receipt.output_artifact_name,
        format!("output-{}", result.receipt.input_artifact_name)
    );

    let status = orchestrator.status();
    assert_eq!(status.state, SubmissionState::Complete);
    assert_eq!(status.percent, 100);

    let downloaded = reqwest::get(&result.output_url)
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(downloaded.as_ref(), image.as_slice());
}

#[tokio::test]
async fn test_server_rate_limit_reaches_the_client() {
    let fixture = TestFixture::new().await;
    let addr = serve(&fixture).await;

    let first = Orchestrator::http(client_config(addr)).unwrap();
    first
        .submit(Submission::new("prewitt", "a.jpg", jpeg_bytes(1024)))
        .await
        .unwrap();

    // Same peer address, fresh local pacer: only the server can refuse
    let second = Orchestrator::http(client_config(addr)).unwrap();
    let err = second
        .submit(Submission::new("prewitt", "b.jpg", jpeg_bytes(1024)))
        .await
        .unwrap_err();

    match err {
        ClientError::RateLimited { retry_after_secs } => {
            assert!((1..=30).contains(&retry_after_secs), "retry after {}", retry_after_secs);
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(second.status().state, SubmissionState::Error);
    assert!(second.pacer().check().is_some());
}

#[tokio::test]
async fn test_local_pacing_blocks_before_upload() {
    let fixture = TestFixture::new().await;
    let addr = serve(&fixture).await;

    let orchestrator = Orchestrator::http(client_config(addr)).unwrap();
    orchestrator
        .submit(Submission::new("prewitt", "a.jpg", jpeg_bytes(1024)))
        .await
        .unwrap();

    let err = orchestrator
        .submit(Submission::new("prewitt", "b.jpg", jpeg_bytes(1024)))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::RateLimited { .. }));
    assert_eq!(fixture.invoker.call_count().await, 1);
}

#[tokio::test]
async fn test_unknown_transform_is_a_validation_error() {
    let fixture = TestFixture::new().await;
    let addr = serve(&fixture).await;

    let orchestrator = Orchestrator::http(client_config(addr)).unwrap();
    let err = orchestrator
        .submit(Submission::new("sharpen", "a.jpg", jpeg_bytes(1024)))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation { .. }), "got {:?}", err);
    assert_eq!(fixture.invoker.call_count().await, 0);
}
