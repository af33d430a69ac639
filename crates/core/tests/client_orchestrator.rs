//! Client orchestrator integration tests against scripted transports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use detectr_core::client::{ClientConfig, ClientError, Orchestrator, Submission, SubmissionState};
use detectr_core::dispatcher::{ErrorBody, JobReceipt, PROCESSING_FAILED};
use detectr_core::testing::{MockConnectivity, MockTransport, TransportScript};

fn receipt(name: &str) -> JobReceipt {
    let now = Utc::now();
    JobReceipt {
        job_id: name.to_string(),
        transform: "prewitt".to_string(),
        input_artifact_name: name.to_string(),
        output_artifact_name: format!("output-{name}"),
        created_at: now,
        completed_at: now,
        expires_at: now + chrono::Duration::seconds(60),
    }
}

fn submission() -> Submission {
    Submission::new("prewitt", "image.jpg", vec![0x42; 10 * 1024])
}

/// Three scripted transports sharing one result probe.
struct Chain {
    primary: Arc<MockTransport>,
    anonymous: Arc<MockTransport>,
    buffered: Arc<MockTransport>,
    connectivity: Arc<MockConnectivity>,
    orchestrator: Arc<Orchestrator>,
}

impl Chain {
    fn new() -> Self {
        Self::with_config(ClientConfig::default().with_visibility_delay(10))
    }

    fn with_config(config: ClientConfig) -> Self {
        let primary = Arc::new(MockTransport::new("streaming"));
        let anonymous = Arc::new(MockTransport::new("streaming-anonymous"));
        let buffered = Arc::new(MockTransport::new("buffered"));
        let connectivity = Arc::new(MockConnectivity::online());

        let orchestrator = Arc::new(Orchestrator::new(
            config,
            vec![primary.clone(), anonymous.clone(), buffered.clone()],
            primary.clone(),
            connectivity.clone(),
        ));

        Self {
            primary,
            anonymous,
            buffered,
            connectivity,
            orchestrator,
        }
    }

    fn sends(&self) -> (usize, usize, usize) {
        (
            self.primary.send_count(),
            self.anonymous.send_count(),
            self.buffered.send_count(),
        )
    }
}

#[tokio::test]
async fn test_successful_submission_completes() {
    let chain = Chain::new();
    chain
        .primary
        .push(TransportScript::receipt(&receipt("1-image.jpg")));

    let result = chain.orchestrator.submit(submission()).await.unwrap();

    assert_eq!(result.transport, "streaming");
    assert!(result.visible);
    assert_eq!(result.receipt.output_artifact_name, "output-1-image.jpg");
    assert_eq!(
        result.output_url,
        "http://127.0.0.1:3001/results/output-1-image.jpg"
    );
    assert_eq!(chain.sends(), (1, 0, 0));

    let status = chain.orchestrator.status();
    assert_eq!(status.state, SubmissionState::Complete);
    assert_eq!(status.percent, 100);
}

#[tokio::test]
async fn test_transport_failures_fall_through_chain() {
    let chain = Chain::new();
    chain.primary.push(TransportScript::Fail("reset".into()));
    chain.anonymous.push(TransportScript::Fail("reset".into()));
    chain
        .buffered
        .push(TransportScript::receipt(&receipt("2-image.jpg")));

    let result = chain.orchestrator.submit(submission()).await.unwrap();

    assert_eq!(result.transport, "buffered");
    assert_eq!(chain.sends(), (1, 1, 1));
}

#[tokio::test]
async fn test_http_error_ends_chain() {
    let chain = Chain::new();
    let body = ErrorBody {
        exit_code: Some(3),
        ..ErrorBody::new(PROCESSING_FAILED).with_details("exited with code 3")
    };
    chain.primary.push(TransportScript::error(500, body));

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::ProcessFailure {
            exit_code: Some(3),
            message: "Processing failed: exited with code 3".to_string(),
        }
    );
    assert_eq!(chain.sends(), (1, 0, 0));
    assert_eq!(chain.orchestrator.status().state, SubmissionState::Error);
}

#[tokio::test]
async fn test_exhausted_chain_is_one_transport_error() {
    let chain = Chain::new();
    for transport in [&chain.primary, &chain.anonymous, &chain.buffered] {
        transport.push(TransportScript::Fail("refused".into()));
    }

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(chain.sends(), (1, 1, 1));
}

#[tokio::test]
async fn test_missing_transform_never_sends() {
    let chain = Chain::new();
    let mut sub = submission();
    sub.transform = None;

    let err = chain.orchestrator.submit(sub).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation { .. }));
    assert_eq!(chain.sends(), (0, 0, 0));
}

#[tokio::test]
async fn test_offline_short_circuits() {
    let chain = Chain::new();
    chain.connectivity.set_online(false);

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert_eq!(err, ClientError::NetworkOffline);
    assert_eq!(chain.sends(), (0, 0, 0));
}

#[tokio::test]
async fn test_local_pacing_blocks_quick_resubmit() {
    let chain = Chain::new();
    chain
        .primary
        .push(TransportScript::receipt(&receipt("3-image.jpg")));

    chain.orchestrator.submit(submission()).await.unwrap();
    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    match err {
        ClientError::RateLimited { retry_after_secs } => {
            assert!((1..=30).contains(&retry_after_secs))
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert_eq!(chain.sends(), (1, 0, 0));
}

#[tokio::test]
async fn test_server_rate_limit_rearms_pacer() {
    let chain = Chain::new();
    let body = ErrorBody {
        retry_after_seconds: Some(17),
        ..ErrorBody::new("Too many requests")
    };
    chain.primary.push(TransportScript::error(429, body));

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert_eq!(err, ClientError::RateLimited { retry_after_secs: 17 });
    let remaining = chain.orchestrator.pacer().check().unwrap();
    assert!(remaining <= 17 && remaining >= 16);
}

#[tokio::test]
async fn test_server_validation_error() {
    let chain = Chain::new();
    chain.primary.push(TransportScript::error(
        400,
        ErrorBody::new("Invalid request").with_details("unknown transform: blur"),
    ));

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::validation("Invalid request: unknown transform: blur")
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_overloaded_is_server_error() {
    let chain = Chain::new();
    chain
        .primary
        .push(TransportScript::error(503, ErrorBody::new("Server busy")));

    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert!(matches!(err, ClientError::Server { status: 503, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_timeout() {
    let chain = Chain::new();
    chain.primary.push(TransportScript::Hang);

    let started = tokio::time::Instant::now();
    let err = chain.orchestrator.submit(submission()).await.unwrap_err();

    assert_eq!(err, ClientError::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(60));
    // the hung transport was not abandoned for the next one
    assert_eq!(chain.sends(), (1, 0, 0));
}

#[tokio::test]
async fn test_new_submission_cancels_previous() {
    let chain = Chain::new();
    chain.primary.push(TransportScript::Hang);
    chain
        .primary
        .push(TransportScript::receipt(&receipt("4-image.jpg")));

    let first = {
        let orchestrator = chain.orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit(submission()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = chain.orchestrator.submit(submission()).await;

    assert_eq!(first.await.unwrap().unwrap_err(), ClientError::Cancelled);
    assert!(second.is_ok());
    assert_eq!(chain.orchestrator.status().state, SubmissionState::Complete);
}

#[tokio::test]
async fn test_explicit_cancel() {
    let chain = Chain::new();
    chain.primary.push(TransportScript::Hang);

    let pending = {
        let orchestrator = chain.orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit(submission()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    chain.orchestrator.cancel();

    assert_eq!(pending.await.unwrap().unwrap_err(), ClientError::Cancelled);
    assert_eq!(chain.orchestrator.status().state, SubmissionState::Idle);
}

#[tokio::test]
async fn test_invisible_result_settles() {
    let chain = Chain::new();
    chain.primary.set_visible(false);
    chain
        .primary
        .push(TransportScript::receipt(&receipt("5-image.jpg")));

    let result = chain.orchestrator.submit(submission()).await.unwrap();

    assert!(!result.visible);
    assert_eq!(chain.primary.probe_count(), 2);
    assert_eq!(chain.orchestrator.status().state, SubmissionState::Complete);
}

#[tokio::test]
async fn test_observers_see_progress() {
    let chain = Chain::new();
    chain
        .primary
        .push(TransportScript::receipt(&receipt("6-image.jpg")));
    let mut rx = chain.orchestrator.subscribe();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            let done = status.state.is_terminal();
            seen.push(status);
            if done {
                break;
            }
        }
        seen
    });

    chain.orchestrator.submit(submission()).await.unwrap();
    let seen = observer.await.unwrap();

    let percents: Vec<u8> = seen.iter().map(|s| s.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().unwrap().percent, 100);
    assert_eq!(seen.last().unwrap().state, SubmissionState::Complete);
}

#[tokio::test]
async fn test_fallback_after_full_upload_never_moves_state_backward() {
    fn order(state: SubmissionState) -> usize {
        [
            SubmissionState::Idle,
            SubmissionState::Preparing,
            SubmissionState::Uploading,
            SubmissionState::AwaitingResult,
            SubmissionState::PollingForVisibility,
            SubmissionState::Complete,
        ]
        .iter()
        .position(|s| *s == state)
        .unwrap_or(usize::MAX)
    }

    let chain = Chain::new();
    chain
        .primary
        .push(TransportScript::FailAfterUpload("connection reset".into()));
    chain
        .anonymous
        .push(TransportScript::receipt(&receipt("7-image.jpg")));
    let mut rx = chain.orchestrator.subscribe();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            let done = status.state.is_terminal();
            seen.push(status);
            if done {
                break;
            }
        }
        seen
    });

    let result = chain.orchestrator.submit(submission()).await.unwrap();
    let seen = observer.await.unwrap();

    assert_eq!(result.transport, "streaming-anonymous");
    assert_eq!(chain.sends(), (1, 1, 0));

    let states: Vec<SubmissionState> = seen.iter().map(|s| s.state).collect();
    assert!(
        states.windows(2).all(|w| order(w[0]) <= order(w[1])),
        "state moved backward: {states:?}"
    );
    let percents: Vec<u8> = seen.iter().map(|s| s.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(states.last(), Some(&SubmissionState::Complete));
}
