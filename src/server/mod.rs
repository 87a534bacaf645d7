//! HTTP surface for the completion gateway and the SOP document
//! operations.
//!
//! The gateway is constructed once at startup and injected into handlers
//! through [`AppState`]; handlers treat completion failures opaquely and
//! only map them onto status codes and JSON error envelopes.

pub mod api;
pub mod sop;

use crate::config::Config;
use crate::providers::CompletionGateway;
use anyhow::Result;
use axum::http::{header, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (1 MiB). SOP documents are text; anything
/// larger is a mistake.
const MAX_BODY_BYTES: usize = 1_048_576;

/// Upper bound on one request, covering retries and the fallback chain.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CompletionGateway>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/complete", post(api::handle_complete))
        .route(
            "/api/complete-with-fallback",
            post(api::handle_complete_with_fallback),
        )
        .route("/api/providers", get(api::handle_providers))
        .route("/api/models", get(api::handle_models))
        .route("/api/health", get(api::handle_health))
        .route("/api/sop/generate", post(sop::handle_generate))
        .route("/api/sop/improve", post(sop::handle_improve))
        .route("/api/sop/analyze", post(sop::handle_analyze))
        .route("/api/sop/summarize", post(sop::handle_summarize))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(cors_layer())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Run the HTTP server until the process is stopped.
pub async fn run(config: Config, gateway: CompletionGateway) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState {
        gateway: Arc::new(gateway),
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "sopsmith gateway listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
