use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all proxy endpoints.
///
/// Bodies are buffered up to one byte over the blob limit. Anything larger
/// is cut off while reading and reported by the put handlers as an
/// oversized blob.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let body_limit = state.manager.config().max_blob_size.saturating_add(1);
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/info", get(handler::info_handler))
        .route("/get/:commitment", get(handler::get_handler))
        .route("/put", post(handler::put_handler))
        .route("/put/:commitment", post(handler::put_keyed_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
