//! Axum router construction.
//!
//! The [`app`] function wires every discovery endpoint to its handler and
//! returns a ready-to-serve [`axum::Router`]. Handlers live in
//! [`crate::handlers`]; the thin wrappers here only unpack extractors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    middleware,
    response::{Html, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use utoipa::OpenApi;

use crate::errors::SdError;
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the discovery endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MinIO Prometheus Service Discovery",
        version = "0.1.0",
        description = "Prometheus HTTP service discovery for MinIO server and bucket metrics"
    ),
    paths(
        handlers::discovery::service_discovery,
        handlers::discovery::scrape_configs,
        handlers::health::health,
    ),
    tags(
        (name = "Discovery", description = "Prometheus HTTP service discovery"),
        (name = "Health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

/// Build the axum [`Router`] with all discovery routes.
///
/// `/metrics` is only mounted when `observability.metrics` is enabled.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(handle_index))
        .route("/sd", get(handle_sd))
        .route("/scrape_configs", get(handle_scrape_configs))
        .route("/health", get(handle_health))
        .route("/openapi.json", get(handle_openapi));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .with_state(state)
        // Request log: method, path, status and latency at INFO.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        // Outermost, so it sees the full request lifecycle.
        .layer(middleware::from_fn(metrics_middleware))
}

/// Route table logged at startup.
pub const ROUTES: &[(&str, &str)] = &[
    ("GET /sd", "Service discovery endpoint"),
    ("GET /scrape_configs", "Scrape configurations endpoint"),
    ("GET /health", "Health check endpoint"),
    ("GET /metrics", "Service metrics endpoint"),
    ("GET /openapi.json", "OpenAPI document"),
    ("GET /", "Documentation endpoint"),
];

// -- Handlers -----------------------------------------------------------------

/// Query string of `GET /sd`.
#[derive(Debug, Deserialize)]
struct SdQuery {
    job: Option<String>,
}

/// `GET /sd?job=<name>`
async fn handle_sd(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<SdQuery>,
) -> Result<Response, SdError> {
    let peer = peer
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    handlers::discovery::service_discovery(state, query.job.as_deref(), &peer).await
}

/// `GET /scrape_configs`
async fn handle_scrape_configs(State(state): State<Arc<AppState>>) -> Result<Response, SdError> {
    handlers::discovery::scrape_configs(state).await
}

/// `GET /health`
async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    handlers::health::health(state).await
}

/// `GET /`
async fn handle_index(State(state): State<Arc<AppState>>) -> Html<String> {
    handlers::health::index(state).await
}

/// `GET /openapi.json`
async fn handle_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------
