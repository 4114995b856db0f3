pub mod analysis;
pub mod health;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/health", get(health::health))
        .route("/pdf-analysis", post(analysis::analyze_default_pdf))
        .route("/{test_type}/pdf-analysis", post(analysis::analyze_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
