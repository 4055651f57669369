//! HTTP surface: `POST /api/chat` as server-sent events, `GET /api/health`.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::ConciergeConfig;
use crate::error::{ConciergeError, Result};
use crate::session::ChatSession;
use crate::types::ChatEvent;

/// Shared state for all routes.
#[derive(Clone, Debug)]
pub struct AppState {
    pub session: ChatSession,
}

impl AppState {
    pub fn new(session: ChatSession) -> Arc<Self> {
        Arc::new(Self { session })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Event stream response; each item is one complete `data:` frame.
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = std::result::Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx).map(|opt| opt.map(Ok))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            axum::body::Body::from_stream(self),
        )
            .into_response()
    }
}

/// Render one outward event as an SSE frame.
pub fn sse_frame(event: &ChatEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({"type": "error", "error": format!("Failed to serialize event: {e}")}).to_string()
    });
    format!("data: {json}\n\n")
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "detail": message.into() }))).into_response()
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<SseResponse, Response> {
    if request.message.trim().is_empty() {
        return Err(detail(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    debug!(conversation_id = ?request.conversation_id, "chat request");

    let (tx, rx) = mpsc::channel(100);
    let session = state.session.clone();

    drop(tokio::spawn(async move {
        let mut events = session.stream_chat(request.message);
        while let Some(event) = events.next().await {
            if tx.send(sse_frame(&event)).await.is_err() {
                // client went away; dropping the stream cancels the turn
                info!("chat client disconnected");
                break;
            }
        }
        for warning in session.drain_warnings() {
            warn!(%warning, "history persistence warning");
        }
    }));

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// CORS policy allowing the configured frontend origin.
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|e| ConciergeError::Configuration(format!("invalid allowed origin '{allowed_origin}': {e}")))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Build the session from `config` and serve until the process is stopped.
pub async fn serve(config: &ConciergeConfig) -> Result<()> {
    let session = ChatSession::from_config(config)?;
    let app = routes(AppState::new(session)).layer(cors_layer(&config.allowed_origin)?);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_single_data_lines() {
        let frame = sse_frame(&ChatEvent::content("hi"));
        assert_eq!(frame, "data: {\"type\":\"content\",\"content\":\"hi\"}\n\n");
    }

    #[test]
    fn bad_origin_is_rejected() {
        assert!(cors_layer("http://localhost:5173").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}
