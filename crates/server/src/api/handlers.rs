use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use detectr_core::{PoolStatus, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub window_secs: u64,
    pub tracked_clients: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub pool: PoolStatus,
    pub rate_limit: RateLimitStatus,
    pub store: String,
}

/// Execution pool and rate limiter snapshot.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let dispatcher = state.dispatcher();
    let limiter = dispatcher.limiter().status().await;
    Json(StatusResponse {
        pool: dispatcher.status(),
        rate_limit: RateLimitStatus {
            window_secs: limiter.window_secs,
            tracked_clients: limiter.tracked_clients,
        },
        store: state.store().name().to_string(),
    })
}

#[derive(Serialize)]
pub struct TransformsResponse {
    pub transforms: Vec<String>,
}

pub async fn list_transforms(State(state): State<Arc<AppState>>) -> Json<TransformsResponse> {
    Json(TransformsResponse {
        transforms: state.dispatcher().registry().names(),
    })
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
