pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Batches of PDFs need more than axum's 2 MB default
        .route(
            "/api/v1/screenings",
            post(handlers::handle_screening).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}
