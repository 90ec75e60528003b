//! HTTP API gateway for Reflexion.
//!
//! Exposes the research agent over REST: chat, feedback-driven revision,
//! chat sessions with transcript export, and a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use reflexion_agent::ReflexionAgent;
use reflexion_config::AppConfig;
use reflexion_core::session::SessionStore;
use reflexion_sessions::InMemorySessionStore;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub agent: Arc<ReflexionAgent>,
    pub sessions: Arc<dyn SessionStore>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS from `gateway.cors_origins` (`*` allows any origin)
/// - Request body size limit from `gateway.max_body_bytes`
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);
    let body_limit = state.config.gateway.max_body_bytes;

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(api::chat_handler))
        .route("/revise", post(api::revise_handler))
        .route("/sessions", get(api::list_sessions_handler))
        .route("/sessions/{id}", get(api::get_session_handler))
        .route("/export-chat", post(api::export_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Builds the provider, search backend, and agent once and shares them
/// across requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    for missing in config.missing_credentials() {
        warn!(missing, "Credential not configured; requests needing it will fail");
    }

    let provider = reflexion_providers::build_from_config(&config.generation);
    let lookup = reflexion_tools::build_from_config(&config.search);
    let agent = Arc::new(ReflexionAgent::from_config(&config, provider, lookup));

    info!(
        addr = %addr,
        provider = agent.provider_name(),
        search = agent.lookup_name(),
        max_iterations = agent.max_iterations(),
        "Gateway starting"
    );

    let state = Arc::new(GatewayState {
        config,
        agent,
        sessions: Arc::new(InMemorySessionStore::new()),
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: DateTime<Utc>,
    agent_status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "Reflexion Research API",
        timestamp: Utc::now(),
        agent_status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    })
}
