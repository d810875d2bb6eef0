//! Tessera HTTP server
//!
//! Exposes the access service over a small JSON API:
//!
//! - `POST /v1/codes` issue a code (issuer key)
//! - `GET /v1/codes/{id}` inspect a code (issuer key)
//! - `POST /v1/codes/{id}/invalidate` invalidate a code (issuer key)
//! - `POST /v1/redeem` redeem a code for a session
//! - `GET /v1/content` fetch gated content with a session token
//! - `GET /health` liveness

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{ConfigError, ServerConfig, StorageConfig};
pub use error::ServerError;
pub use state::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/codes", post(handlers::codes::issue_code))
        .route("/v1/codes/{id}", get(handlers::codes::code_status))
        .route(
            "/v1/codes/{id}/invalidate",
            post(handlers::codes::invalidate_code),
        )
        .route("/v1/redeem", post(handlers::redeem::redeem))
        .route("/v1/content", get(handlers::redeem::fetch_content))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
