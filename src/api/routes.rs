//! REST endpoints for chats and messages.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use super::service::ChatService;
use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage};

/// Shared state for the chat routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ChatService>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Store errors as HTTP responses.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            other => {
                warn!(error = %other, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// POST /chats
///
/// Creates a chat whose history starts with the welcome message.
async fn create_chat(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let chat = state.service.create_chat().await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /chats
async fn list_chats(State(state): State<ApiState>) -> Result<Json<Vec<Chat>>, ApiError> {
    Ok(Json(state.service.list_chats().await?))
}

/// GET /chats/{id}/messages
async fn list_messages(
    State(state): State<ApiState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.list_messages(ChatId(chat_id)).await?))
}

/// POST /chats/{id}/messages
///
/// Stores the message and, for user messages, the bot's replies. Returns the
/// stored message; replies show up on the next listing.
async fn post_message(
    State(state): State<ApiState>,
    Path(chat_id): Path<i64>,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let stored = state.service.post_message(ChatId(chat_id), body).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Build the chat REST routes with permissive CORS.
pub fn chat_routes(service: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/{id}/messages", get(list_messages).post(post_message))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(ApiState { service })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{DialogueEngine, prompts};
    use crate::model::Role;
    use crate::store::InMemoryChatStore;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = ChatService::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::new(DialogueEngine::default()),
        );
        chat_routes(Arc::new(service))
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn create_then_list_messages() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::post("/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let chat: Chat = json_body(response).await;

        let response = app
            .oneshot(
                Request::get(format!("/chats/{}/messages", chat.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let messages: Vec<Message> = json_body(response).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Bot);
    }

    #[tokio::test]
    async fn post_message_returns_user_message() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::post("/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let chat: Chat = json_body(response).await;

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/chats/{}/messages", chat.id))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"role":"user","content":"yes"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let stored: Message = json_body(response).await;
        assert_eq!(stored.role, Role::User);
        assert_eq!(stored.content, "yes");

        let response = app
            .oneshot(
                Request::get(format!("/chats/{}/messages", chat.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let messages: Vec<Message> = json_body(response).await;
        assert_eq!(messages.last().unwrap().content, prompts::ASK_NAME);
    }

    #[tokio::test]
    async fn unknown_chat_is_404() {
        let response = app()
            .oneshot(Request::get("/chats/41/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("41"));
    }
}
