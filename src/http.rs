//! JSON-over-HTTP reasoning endpoint.
//!
//! `POST /v1/reason` takes a [`QueryRequest`] and returns a [`ReasoningReport`];
//! `GET /health` reports backend availability.

use crate::embeddings::OpenAIEmbedder;
use crate::engine::{Engine, ReasoningQuery, ReasoningReport};
use crate::error::{Result, RiskchainError};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Reasoning request body: a [`ReasoningQuery`] plus an optional risk description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub query: ReasoningQuery,
    /// Embedded by the configured embedding client when `query_vector` is absent.
    #[serde(default)]
    pub query_text: Option<String>,
}

/// Error response: `{ "error": ..., "kind": ... }`
pub struct ApiError(pub RiskchainError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RiskchainError::SeedNotFound(_) | RiskchainError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            RiskchainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RiskchainError::DimensionMismatch { .. } | RiskchainError::IndexEmpty => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RiskchainError> for ApiError {
    fn from(err: RiskchainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Reasoning request failed: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "kind": self.0.kind(),
            })),
        )
            .into_response()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    embedder: Option<Arc<OpenAIEmbedder>>,
    max_retries: usize,
    allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, embedder: Option<Arc<OpenAIEmbedder>>, max_retries: usize, allowed_origins: Vec<String>) -> Self {
        Self {
            engine,
            embedder,
            max_retries,
            allowed_origins,
        }
    }
}

/// Build the axum router
pub fn router(state: AppState) -> Router {
    // Explicit origins when configured, otherwise any origin (local use)
    let cors = if state.allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/v1/reason", post(handle_reason))
        .route("/health", get(handle_health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        RiskchainError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind to {}: {}. Set http_server.port in config.toml to use another port.", addr, e),
        ))
    })?;

    log::info!("Starting riskchain HTTP server on http://{}", addr);
    log::info!("Reasoning endpoint: POST http://{}/v1/reason", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| RiskchainError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("HTTP server error: {}", e))))?;
    Ok(())
}

/// Validate Origin header (prevents DNS rebinding attacks)
fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> std::result::Result<(), Response> {
    if allowed_origins.is_empty() {
        return Ok(());
    }
    // Non-browser clients send no Origin
    let Some(origin) = headers.get("origin").and_then(|h| h.to_str().ok()) else {
        return Ok(());
    };
    if allowed_origins.iter().any(|allowed| origin == allowed) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": format!("Origin '{}' is not in the allowed origins list", origin),
                "kind": "origin_not_allowed",
            })),
        )
            .into_response())
    }
}

async fn resolve_query(state: &AppState, request: QueryRequest) -> Result<ReasoningQuery> {
    let mut query = request.query;
    if query.query_vector.is_some() {
        return Ok(query);
    }
    if let Some(text) = request.query_text {
        let embedder = state.embedder.as_ref().ok_or_else(|| {
            RiskchainError::InvalidInput(
                "query_text requires an [embeddings] section in config.toml".to_string(),
            )
        })?;
        query.query_vector = Some(embedder.embed_query(&text, state.max_retries).await?);
    }
    Ok(query)
}

pub async fn handle_reason(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Response {
    if let Err(rejection) = validate_origin(&headers, &state.allowed_origins) {
        return rejection;
    }

    let result: Result<ReasoningReport> = async {
        let query = resolve_query(&state, request).await?;
        state.engine.reason(query).await
    }
    .await;

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn handle_health(State(state): State<AppState>) -> Response {
    let health = state.engine.health().await;
    let status = if health.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": health.status,
            "service": "riskchain",
            "version": env!("CARGO_PKG_VERSION"),
            "graph_healthy": health.graph_healthy,
            "index_healthy": health.index_healthy,
            "index_size": health.index_size,
            "index_dimension": health.index_dimension,
        })),
    )
        .into_response()
}
