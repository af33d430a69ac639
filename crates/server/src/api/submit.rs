//! Submission endpoints.
//!
//! `POST /api/process` takes the transform as a multipart field; the
//! path-form routes take it from the URL. Both accept the image as `image`
//! or `file`.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use detectr_core::{ClientId, JobReceipt, SubmitRequest};
use tracing::{debug, info, warn};

use super::error::{status_for, ApiError};
use crate::state::AppState;

const DEFAULT_FILE_NAME: &str = "upload";

/// Fields collected from a submission form.
#[derive(Debug, Default)]
struct SubmissionForm {
    transform: Option<String>,
    image: Option<Vec<u8>>,
    file_name: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "file" => {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.image = Some(bytes.to_vec());
            }
            "transform" | "operator" => {
                let text = field.text().await.map_err(multipart_error)?;
                form.transform = Some(text);
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::validation(format!("malformed multipart body: {}", err.body_text()))
    }
}

async fn dispatch(
    state: &AppState,
    client_id: ClientId,
    transform: Option<String>,
    form: SubmissionForm,
) -> Result<Json<JobReceipt>, ApiError> {
    let transform = transform.ok_or_else(|| ApiError::validation("transform is required"))?;
    let image = form
        .image
        .ok_or_else(|| ApiError::validation("image is required"))?;
    let original_name = form
        .file_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    let request = SubmitRequest {
        client_id: client_id.clone(),
        transform,
        image,
        original_name,
    };

    match state.dispatcher().submit(request).await {
        Ok(receipt) => {
            info!(
                job_id = %receipt.job_id,
                client = %client_id,
                transform = %receipt.transform,
                "Job completed"
            );
            Ok(Json(receipt))
        }
        Err(e) => {
            if status_for(&e).is_server_error() {
                warn!(client = %client_id, error = %e, "Submission failed");
            } else {
                debug!(client = %client_id, error = %e, "Submission rejected");
            }
            Err(e.into())
        }
    }
}

/// `POST /api/process`
pub async fn process(
    State(state): State<Arc<AppState>>,
    Extension(client_id): Extension<ClientId>,
    multipart: Multipart,
) -> Result<Json<JobReceipt>, ApiError> {
    let mut form = read_form(multipart).await?;
    let transform = form.transform.take();
    dispatch(&state, client_id, transform, form).await
}

/// `POST /api/transforms/{name}` and `POST /api/operators/{name}`
pub async fn process_named(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Extension(client_id): Extension<ClientId>,
    multipart: Multipart,
) -> Result<Json<JobReceipt>, ApiError> {
    let form = read_form(multipart).await?;
    dispatch(&state, client_id, Some(name), form).await
}
