//! Request framing for the agent: one JSON reply, or NDJSON lines per graph node.

use std::convert::Infallible;
use std::time::Instant;

use atlas_agent::{AgentRuntime, StateSnapshot};
use atlas_core::domain::conversation::{ConversationId, Message};
use atlas_core::errors::{ApplicationError, DomainError, InterfaceError};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 8_000;
const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    request_id: String,
}

pub fn router(runtime: AgentRuntime) -> Router {
    Router::new().route("/chat", post(chat)).route("/chat/stream", post(chat_stream)).with_state(runtime)
}

async fn chat(State(runtime): State<AgentRuntime>, Json(request): Json<ChatRequest>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let (message, conversation_id) = match validate(request, &request_id) {
        Ok(validated) => validated,
        Err(error) => return error_response(error),
    };

    let started = Instant::now();
    let response = runtime.chat(&message, &conversation_id).await;
    info!(
        event_name = "server.chat.completed",
        correlation_id = %conversation_id,
        request_id = %request_id,
        duration_ms = started.elapsed().as_millis() as u64,
        "chat request served"
    );
    Json(ChatResponse { response, conversation_id: conversation_id.0 }).into_response()
}

async fn chat_stream(State(runtime): State<AgentRuntime>, Json(request): Json<ChatRequest>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let (message, conversation_id) = match validate(request, &request_id) {
        Ok(validated) => validated,
        Err(error) => return error_response(error),
    };
    info!(
        event_name = "server.chat.stream_started",
        correlation_id = %conversation_id,
        request_id = %request_id,
        "streaming chat request"
    );

    let lines = runtime
        .stream(&message, conversation_id.clone())
        .scan(0_usize, |seen, snapshot| {
            let lines = snapshot_lines(&snapshot, *seen);
            *seen = snapshot.state.messages.len();
            future::ready(Some(stream::iter(lines)))
        })
        .flatten()
        .chain(stream::once(future::ready(ndjson(&json!({ "type": "done" })))))
        .map(Ok::<_, Infallible>);

    let mut response = Response::new(Body::from_stream(lines));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(NDJSON));
    for (name, value) in [("x-request-id", request_id.as_str()), ("x-conversation-id", conversation_id.as_str())] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    response
}

fn validate(request: ChatRequest, request_id: &str) -> Result<(String, ConversationId), InterfaceError> {
    let length = request.message.trim().chars().count();
    if length == 0 || request.message.chars().count() > MAX_MESSAGE_CHARS {
        let violation = DomainError::InvariantViolation(format!(
            "message must be between 1 and {MAX_MESSAGE_CHARS} characters"
        ));
        return Err(ApplicationError::from(violation).into_interface(request_id));
    }
    let conversation_id = request
        .conversation_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok((request.message, ConversationId(conversation_id)))
}

fn error_response(error: InterfaceError) -> Response {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(
        event_name = "server.chat.rejected",
        request_id = error.correlation_id(),
        error = %error,
        "chat request rejected"
    );
    let body = ErrorBody {
        error: error.user_message(),
        detail: error.to_string(),
        request_id: error.correlation_id().to_string(),
    };
    (status, Json(body)).into_response()
}

/// A `node` line per snapshot. Handler snapshots also carry the replies they added.
fn snapshot_lines(snapshot: &StateSnapshot, seen: usize) -> Vec<String> {
    let mut lines = vec![ndjson(&json!({ "type": "node", "node": snapshot.node }))];
    if matches!(snapshot.node, "router" | "memory") {
        return lines;
    }
    let added = snapshot.state.messages.get(seen..).unwrap_or_default();
    lines.extend(added.iter().filter_map(|message| match message {
        Message::Assistant(reply) => Some(ndjson(&json!({ "type": "message", "content": reply.content }))),
        Message::User(_) => None,
    }));
    lines
}

fn ndjson(value: &Value) -> String {
    format!("{value}\n")
}

#[cfg(test)]
mod tests {
    use atlas_agent::AgentRuntime;
    use atlas_core::config::AppConfig;
    use atlas_core::persona::ASSISTANT_NAME;
    use atlas_db::connect_with_settings;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, MAX_MESSAGE_CHARS};

    async fn app() -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let runtime = AgentRuntime::from_config(&AppConfig::default(), pool).expect("runtime");
        router(runtime)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn chat_returns_the_reply_and_a_generated_conversation_id() {
        let response = app().await.oneshot(post("/chat", json!({ "message": "hello" }))).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert!(payload["response"].as_str().unwrap_or_default().contains(ASSISTANT_NAME));
        assert!(!payload["conversation_id"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn blank_and_oversized_messages_are_rejected() {
        let app = app().await;

        let blank = app.clone().oneshot(post("/chat", json!({ "message": "   " }))).await.expect("response");
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let oversized = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let response = app.oneshot(post("/chat/stream", json!({ "message": oversized }))).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert!(payload["detail"].as_str().unwrap_or_default().contains("bad request"));
    }

    #[tokio::test]
    async fn stream_emits_node_message_and_done_lines() {
        let response = app()
            .await
            .oneshot(post("/chat/stream", json!({ "message": "hello", "conversation_id": "c-9" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-conversation-id"], "c-9");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["content-type"], "application/x-ndjson");

        let lines: Vec<Value> = body_text(response)
            .await
            .lines()
            .map(|line| serde_json::from_str(line).expect("ndjson line"))
            .collect();
        let kinds: Vec<&str> = lines.iter().map(|line| line["type"].as_str().unwrap_or_default()).collect();
        assert_eq!(kinds, vec!["node", "node", "message", "node", "done"]);
        assert_eq!(lines[1]["node"], "conversation");
        assert!(lines[2]["content"].as_str().unwrap_or_default().contains(ASSISTANT_NAME));
    }
}
