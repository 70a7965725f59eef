use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ChatError;
use crate::metrics::{MetricsSnapshot, RelayMetrics};
use crate::models::chat::{ChatRequest, ErrorBody};
use crate::prompt::compose_messages;
use crate::provider::Provider;
use crate::validation::validate_chat_request;

pub const CHAT_PATH: &str = "/functions/v1/ai-flight-instructor";

const CORS_HEADERS: [(&str, &str); 2] = [
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-headers",
        "authorization, x-client-info, apikey, content-type",
    ),
];

const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
const QUOTA_EXHAUSTED_MESSAGE: &str = "AI credits exhausted. Please add credits to continue.";
const SERVICE_ERROR_MESSAGE: &str = "AI service error";

pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(CHAT_PATH, post(handle_chat).options(handle_preflight))
        .route("/health", get(handle_health))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
    };
    (status, CORS_HEADERS, Json(body)).into_response()
}

fn upstream_error_response(metrics: &RelayMetrics, err: ChatError) -> Response {
    error!("Upstream request failed: {}", err);
    match err {
        ChatError::RateLimited(_) => {
            metrics.record_rate_limited();
            error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE)
        }
        ChatError::QuotaExhausted(_) => {
            metrics.record_quota_exhausted();
            error_response(StatusCode::PAYMENT_REQUIRED, QUOTA_EXHAUSTED_MESSAGE)
        }
        ChatError::ConfigError(message) => {
            metrics.record_upstream_failure();
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        _ => {
            metrics.record_upstream_failure();
            error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVICE_ERROR_MESSAGE)
        }
    }
}

pub async fn handle_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.metrics.record_request();

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            error!("Invalid request body: {}", e);
            state.metrics.record_rejected();
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", e),
            );
        }
    };

    if let Err(e) = validate_chat_request(&request) {
        error!("Validation failed: {}", e);
        state.metrics.record_rejected();
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let messages = compose_messages(&request);
    info!(
        "{}: Forwarding {} messages (mode: {:?}, document: {})",
        state.provider.name(),
        messages.len(),
        request.mode(),
        request
            .document_context
            .as_ref()
            .map(|d| d.title.as_str())
            .unwrap_or("none")
    );

    let stream = match state.provider.stream_chat(messages).await {
        Ok(s) => s,
        Err(e) => return upstream_error_response(&state.metrics, e),
    };

    state.metrics.record_stream_opened();

    // Pass the gateway's SSE body through untouched
    let metrics = state.metrics.clone();
    let passthrough = stream.inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            metrics.record_bytes(chunk.len());
        }
    });

    (
        StatusCode::OK,
        CORS_HEADERS,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(passthrough),
    )
        .into_response()
}

pub async fn handle_preflight() -> impl IntoResponse {
    (StatusCode::OK, CORS_HEADERS)
}

pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
