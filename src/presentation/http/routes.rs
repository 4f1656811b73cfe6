//! HTTP Route Configuration
//!
//! The HTTP surface is deliberately small: the gateway upgrade endpoint
//! and a health probe.

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors.allowed_origins);

    Router::new()
        .route("/gateway", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
