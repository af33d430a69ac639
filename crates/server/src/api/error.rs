//! Mapping of dispatch failures onto HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use detectr_core::{DispatchError, ErrorBody, StoreError};

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Dispatch(DispatchError),
    /// The request body exceeded `server.max_upload_bytes`.
    PayloadTooLarge,
    NotFound,
}

impl ApiError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Dispatch(DispatchError::validation(reason))
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_client_error() {
            Self::NotFound
        } else {
            Self::Dispatch(DispatchError::Storage(err))
        }
    }
}

/// HTTP status for a dispatch failure.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
        DispatchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        DispatchError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::ExecutableNotFound
        | DispatchError::Configuration(_)
        | DispatchError::ProcessFailure { .. }
        | DispatchError::Timeout { .. }
        | DispatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Dispatch(err) => {
                let status = status_for(&err);
                let mut response = (status, Json(err.to_body())).into_response();
                if let DispatchError::RateLimited { retry_after_secs } = err {
                    response.headers_mut().insert(
                        header::RETRY_AFTER,
                        HeaderValue::from(retry_after_secs),
                    );
                }
                response
            }
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorBody::new("Payload too large")),
            )
                .into_response(),
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not found"))).into_response()
            }
        }
    }
}
