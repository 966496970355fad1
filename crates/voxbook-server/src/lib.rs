//! HTTP backend for the voxbook booking assistant.
//!
//! Issues LiveKit join tokens for new calls and serves the latest call
//! summary written by the booking agent.

pub mod api;
pub mod config;
pub mod store;
pub mod token;

use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use store::SummaryStore;
use token::TokenIssuer;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Signs join tokens for fresh call rooms.
    pub tokens: TokenIssuer,
    /// Latest call summary.
    pub summaries: SummaryStore,
}

impl AppState {
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            tokens: TokenIssuer::new(config.livekit.clone()),
            summaries: SummaryStore::new(&config.summary.path),
        }
    }
}

async fn root() -> &'static str {
    "OK"
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/token", get(api::token_handler))
        .route("/api/summary", get(api::summary_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
