use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::{artifacts, handlers, middleware as mw, submit};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Submission
        .route("/process", post(submit::process))
        .route("/transforms", get(handlers::list_transforms))
        .route("/transforms/{name}", post(submit::process_named))
        .route("/operators/{name}", post(submit::process_named));

    // Retrieval surface
    let artifact_routes = Router::new()
        .route(
            "/uploads/{name}",
            get(artifacts::get_upload).head(artifacts::head_upload),
        )
        .route(
            "/results/{name}",
            get(artifacts::get_result).head(artifacts::head_result),
        );

    Router::new()
        .nest("/api", api_routes)
        .merge(artifact_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            mw::identity_middleware,
        ))
        .layer(middleware::from_fn(mw::metrics_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
