//! HTTP and WebSocket front end.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | Broadcast a `hello`; replies `Hello, World!` |
//! | `GET /ws` | Client session: inbound `{to, type, data}`, outbound `{event, payload}` |
//! | `GET /health` | Liveness and gateway counters |
//! | `GET /metrics` | Prometheus text exposition |

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use vany_bus::{Capability, SessionId, BROADCAST_RECIPIENT};
use vany_gateway::{ClientTransport, GatewayHandle, OutboundFrame, SessionRegistry};
use vany_telemetry::MetricsHandle;

use crate::runtime::VanyRuntime;

/// Event sent once when a socket connects, carrying its session id.
pub const SESSION_EVENT: &str = "session";

/// Event sent when an inbound frame cannot be parsed.
pub const ERROR_EVENT: &str = "error";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    gateway: GatewayHandle,
    sessions: Arc<SessionRegistry>,
    metrics: MetricsHandle,
}

impl AppState {
    pub fn new(gateway: GatewayHandle, sessions: Arc<SessionRegistry>, metrics: MetricsHandle) -> Self {
        Self {
            gateway,
            sessions,
            metrics,
        }
    }

    #[must_use]
    pub fn from_runtime(runtime: &VanyRuntime, metrics: MetricsHandle) -> Self {
        Self::new(runtime.gateway(), runtime.sessions(), metrics)
    }
}

/// A request as sent by a WebSocket client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundRequest {
    #[serde(default = "default_recipient")]
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

fn default_recipient() -> String {
    BROADCAST_RECIPIENT.to_string()
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<InboundRequest, serde_json::Error> {
    serde_json::from_str(text)
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<&'static str, (StatusCode, String)> {
    state
        .gateway
        .enqueue_request(BROADCAST_RECIPIENT, Capability::Hello, json!({}), None)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok("Hello, World!")
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.gateway.stats();
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.session_count(),
        "gateway": {
            "forwarded": stats.forwarded,
            "delivered": stats.delivered,
            "broadcast": stats.broadcast,
            "delivery_failures": stats.delivery_failures,
            "timeouts": stats.timeouts,
        }
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn info_frame(event: &str, body: Value) -> OutboundFrame {
    OutboundFrame {
        event: event.to_string(),
        payload: body.to_string(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sid, mut frames) = state.sessions.open_session();
    info!(sid = %sid, "Client connected");

    let (mut sink, mut stream) = socket.split();

    let writer_sid = sid.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let text = match frame.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(sid = %writer_sid, error = %e, "Dropping unencodable frame");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = state
        .sessions
        .emit_to(&sid, info_frame(SESSION_EVENT, json!({ "sid": sid.as_str() })))
    {
        warn!(sid = %sid, error = %e, "Failed to announce session");
    }

    while let Some(Ok(message)) = stream.next().await {
        match message {
            WsMessage::Text(text) => {
                if !forward_inbound(&state, &sid, &text) {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    close_session(&state, sid);
    if let Err(e) = writer.await {
        debug!(error = %e, "Socket writer ended abnormally");
    }
}

/// Hand one inbound frame to the gateway. Returns `false` once the gateway
/// is gone.
fn forward_inbound(state: &AppState, sid: &SessionId, text: &str) -> bool {
    match parse_inbound(text) {
        Ok(request) => {
            debug!(sid = %sid, to = %request.to, kind = %request.kind, "Client request");
            match state
                .gateway
                .enqueue_request(request.to, request.kind, request.data, Some(sid.clone()))
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(sid = %sid, error = %e, "Gateway unavailable, closing session");
                    false
                }
            }
        }
        Err(e) => {
            let frame = info_frame(ERROR_EVENT, json!({ "error": e.to_string() }));
            if let Err(e) = state.sessions.emit_to(sid, frame) {
                debug!(sid = %sid, error = %e, "Failed to report bad request");
            }
            true
        }
    }
}

fn close_session(state: &AppState, sid: SessionId) {
    state.sessions.close_session(&sid);
    if let Err(e) = state.gateway.session_closed(sid.clone()) {
        debug!(sid = %sid, error = %e, "Gateway already stopped");
    }
    info!(sid = %sid, "Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inbound() {
        let req = parse_inbound(r#"{"to":"BluetoothScanner","type":"btscan","data":{"time":3}}"#).unwrap();
        assert_eq!(req.to, "BluetoothScanner");
        assert_eq!(req.kind, "btscan");
        assert_eq!(req.data, json!({"time": 3}));
    }

    #[test]
    fn test_parse_inbound_defaults() {
        let req = parse_inbound(r#"{"type":"hello"}"#).unwrap();
        assert_eq!(req.to, "All");
        assert_eq!(req.data, Value::Null);
    }

    #[test]
    fn test_parse_inbound_rejects_missing_type() {
        assert!(parse_inbound(r#"{"to":"All"}"#).is_err());
        assert!(parse_inbound("hello").is_err());
    }
}
