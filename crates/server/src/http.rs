//! HTTP endpoints
//!
//! `POST /qa` is the request surface; stage failures map onto 400/408/
//! 503/500 per the pipeline's failure kinds. Admission is bounded by the
//! state's semaphore and saturation returns a retryable 503.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docqa_agent::{QaRequest, QaResponse};
use docqa_core::FailureKind;

use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        .route("/qa", post(qa))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Error payload
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    retryable: bool,
}

struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn from_pipeline(error: docqa_core::Error) -> Self {
        let kind = error.kind();
        let status = match kind {
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            FailureKind::Upstream => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                kind: kind.as_str(),
                retryable: matches!(kind, FailureKind::Upstream | FailureKind::Timeout),
            },
        }
    }

    fn saturated() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ErrorBody {
                error: "server is at capacity, retry later".to_string(),
                kind: "saturated",
                retryable: true,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// POST /qa
async fn qa(
    State(state): State<AppState>,
    Json(request): Json<QaRequest>,
) -> Result<Json<QaResponse>, ApiError> {
    // Backpressure: reject instead of queueing unboundedly
    let _permit = state
        .admission
        .clone()
        .try_acquire_owned()
        .map_err(|_| ApiError::saturated())?;

    match state.pipeline.answer(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            if e.kind() == FailureKind::Internal {
                tracing::error!(error = %e, "internal pipeline error");
            } else {
                tracing::warn!(error = %e, kind = e.kind().as_str(), "request failed");
            }
            Err(ApiError::from_pipeline(e))
        },
    }
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache = state.pipeline.cache().stats();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "entries": cache.entries,
            "hits": cache.hits,
            "misses": cache.misses,
        },
    }))
}

/// GET /ready - verifies the generator runtime is reachable
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let generator_ready = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        state.generator_runtime.is_available(),
    )
    .await
    .unwrap_or(false);

    let status = if generator_ready { "ready" } else { "not_ready" };
    let status_code = if generator_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "checks": {
                "generator": {
                    "status": if generator_ready { "ok" } else { "unreachable" },
                    "model": state.generator_runtime.model_name(),
                },
            },
        })),
    )
}

/// Build CORS from configured origins; empty config defaults to localhost
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "invalid CORS origin");
                None
            },
        })
        .collect();

    if parsed.is_empty() {
        return CorsLayer::new()
            .allow_origin(
                "http://localhost:3000"
                    .parse::<HeaderValue>()
                    .expect("static origin"),
            )
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_config::Settings;

    fn offline_state() -> AppState {
        let mut settings = Settings::default();
        settings.embedding.provider = "hash".into();
        settings.index.provider = docqa_config::IndexProvider::Memory;
        settings.generation.provider = "unavailable".into();
        AppState::from_settings(settings).unwrap()
    }

    #[test]
    fn test_router_creation() {
        let _ = create_router(offline_state());
    }

    #[test]
    fn test_error_mapping() {
        let e = ApiError::from_pipeline(docqa_core::Error::Validation("empty".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert!(!e.body.retryable);

        let e = ApiError::from_pipeline(docqa_core::Error::timeout("total"));
        assert_eq!(e.status, StatusCode::REQUEST_TIMEOUT);
        assert!(e.body.retryable);

        let e = ApiError::from_pipeline(docqa_core::Error::upstream("embedder", "down"));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(e.body.retryable);

        let e = ApiError::from_pipeline(docqa_core::Error::Internal("bug".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.body.retryable);
    }
}
