//! REST API endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};

use super::metrics::TEXTS_EMBEDDED;
use crate::embeddings::{EmbeddingRequest, EmbeddingResponse, EmbeddingService, HealthStatus};
use crate::{Error, Result};

/// Create REST API router.
pub fn create_rest_router(service: EmbeddingService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/embeddings", post(create_embeddings))
        .route("/metrics", get(metrics))
        .with_state(service)
}

/// Health check endpoint. Always 200, even while the model is loading.
async fn health_check(State(service): State<EmbeddingService>) -> Json<HealthStatus> {
    let health = service.health();
    tracing::debug!(model_loaded = health.model_loaded, "Health check");
    Json(health)
}

/// Embedding endpoint.
///
/// Readiness is checked before the body is looked at, so a loading service
/// answers 503 whatever the payload.
async fn create_embeddings(
    State(service): State<EmbeddingService>,
    payload: std::result::Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>> {
    if !service.is_ready() {
        return Err(Error::NotReady);
    }

    let Json(request) = payload.map_err(|rejection| Error::bad_request(rejection.body_text()))?;
    let response = service.embed(request).await?;

    TEXTS_EMBEDDED.inc_by(response.input_count as u64);
    tracing::info!(input_count = response.input_count, "Embeddings generated");

    Ok(Json(response))
}

/// Prometheus metrics endpoint.
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}
