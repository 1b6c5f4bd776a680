//! REST API server for the budget assistant
//!
//! Stateless: callers send the conversation so far with every request.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::assistant::{AssistantMode, BudgetAssistant};
use crate::models::ChatMessage;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub mode: AssistantMode,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub chat_id: Option<String>,
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub mode: AssistantMode,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<BudgetAssistant>,
}

/// =============================
/// Helpers
/// =============================

/// Last user message becomes the query; known-role messages before it become history
fn split_chat(messages: &[IncomingMessage]) -> Option<(String, Vec<ChatMessage>)> {
    let last_user = messages
        .iter()
        .rposition(|m| m.role.eq_ignore_ascii_case("user"))?;

    let history = messages[..last_user]
        .iter()
        .filter_map(|m| match m.role.to_lowercase().as_str() {
            "user" => Some(ChatMessage::user(m.content.clone())),
            "assistant" | "agent" => Some(ChatMessage::assistant(m.content.clone())),
            _ => None,
        })
        .collect();

    Some((messages[last_user].content.clone(), history))
}

async fn answer(
    state: &ApiState,
    query: &str,
    history: Vec<ChatMessage>,
    mode: AssistantMode,
) -> (StatusCode, Json<ApiResponse>) {
    if query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query must not be empty".into())),
        );
    }

    let response = state.assistant.process(query, history, mode).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "mode": mode,
            "answer": response.final_response,
            "conversation_history": response.conversation_history,
            "error": response.error,
        }))),
    )
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn query_handler(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(mode = ?req.mode, history_len = req.history.len(), "Received query request");
    answer(&state, &req.query, req.history, req.mode).await
}

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some((query, history)) = split_chat(&req.messages) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message found".into())),
        );
    };

    info!(chat_id = ?req.chat_id, history_len = history.len(), "Received chat request");

    let (status, Json(mut response)) = answer(&state, &query, history, req.mode).await;
    if let (Some(data), Some(chat_id)) = (response.data.as_mut(), req.chat_id) {
        data["chat_id"] = serde_json::json!(chat_id);
    }
    (status, Json(response))
}

/// =============================
/// Router
/// =============================

pub fn create_router(assistant: Arc<BudgetAssistant>) -> Router {
    let state = ApiState { assistant };

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query_handler))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    assistant: Arc<BudgetAssistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatcherConfig;
    use crate::models::Role;
    use crate::testing::{ScriptedGenerator, StaticMarket, StaticSource};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(replies: &[&str], store: StaticSource) -> Router {
        let assistant = BudgetAssistant::from_capabilities(
            Arc::new(ScriptedGenerator::new(replies.iter().copied())),
            Arc::new(store),
            Arc::new(StaticMarket::healthy()),
            DispatcherConfig::default(),
        );
        create_router(Arc::new(assistant))
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, ApiResponse) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn msg(role: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_split_chat_uses_last_user_message() {
        let messages = vec![
            msg("system", "be nice"),
            msg("user", "What did I spend?"),
            msg("assistant", "$20.00"),
            msg("user", "And on food?"),
        ];

        let (query, history) = split_chat(&messages).unwrap();

        assert_eq!(query, "And on food?");
        assert_eq!(
            history,
            vec![
                ChatMessage::user("What did I spend?"),
                ChatMessage::assistant("$20.00")
            ]
        );
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_split_chat_without_user() {
        assert!(split_chat(&[msg("assistant", "hello")]).is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&[], StaticSource::answering("x"))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_endpoint_routes_to_store() {
        let (status, body) = post_json(
            app(&["YES"], StaticSource::answering("$432.10 across 14 transactions")),
            "/api/query",
            serde_json::json!({"query": "What were my expenses last month?"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["answer"], "$432.10 across 14 transactions");
        assert_eq!(data["mode"], "router");
        assert_eq!(data["conversation_history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_endpoint_echoes_chat_id() {
        let (status, body) = post_json(
            app(&["NO", "Paris."], StaticSource::answering("x")),
            "/api/chat",
            serde_json::json!({
                "chat_id": "abc",
                "messages": [{"role": "user", "content": "What is the capital of France?"}]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["answer"], "Paris.");
        assert_eq!(data["chat_id"], "abc");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (status, body) = post_json(
            app(&[], StaticSource::answering("x")),
            "/api/query",
            serde_json::json!({"query": "   "}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }
}
