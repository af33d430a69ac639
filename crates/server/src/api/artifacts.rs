//! Retrieval surface for staged inputs and transform results.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use detectr_core::client::guess_content_type;
use detectr_core::ArtifactRef;

use super::error::ApiError;
use crate::state::AppState;

async fn read(state: &AppState, artifact: ArtifactRef) -> Result<Response, ApiError> {
    let bytes = state
        .store()
        .retrieve(&artifact)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, guess_content_type(&artifact.name).to_string()),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}

async fn stat(state: &AppState, artifact: ArtifactRef) -> Result<Response, ApiError> {
    let len = state
        .store()
        .exists(&artifact)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, guess_content_type(&artifact.name).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
    )
        .into_response())
}

/// `GET /uploads/{name}`
pub async fn get_upload(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    read(&state, ArtifactRef::input(name)).await
}

/// `HEAD /uploads/{name}`
pub async fn head_upload(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    stat(&state, ArtifactRef::input(name)).await
}

/// `GET /results/{name}`
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    read(&state, ArtifactRef::output(name)).await
}

/// `HEAD /results/{name}`
pub async fn head_result(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    stat(&state, ArtifactRef::output(name)).await
}
