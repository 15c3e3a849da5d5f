//! REST endpoints for the dashboard front-end.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::analytics::{compute_analytics_stats, compute_dashboard_summary, compute_label_stats};
use crate::assistant::{Assistant, GREETING};
use crate::draft::{DraftGenerator, DraftInput};
use crate::error::{AssistantError, LlmError};
use crate::feed::{CycleOutcome, Email, EmailSource, EmailStore, run_cycle};
use crate::llm::ImagePart;
use crate::view::{ViewQuery, apply, export_csv, export_filename};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EmailStore>,
    /// Source used by on-demand refreshes.
    pub source: Arc<dyn EmailSource>,
    pub drafts: Arc<DraftGenerator>,
    pub assistant: Arc<Assistant>,
}

/// Build the dashboard router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/emails", get(list_emails))
        .route("/api/emails/export", get(export_emails))
        .route("/api/analytics", get(analytics))
        .route("/api/labels", get(labels))
        .route("/api/dashboard", get(dashboard))
        .route("/api/feed/status", get(feed_status))
        .route("/api/feed/refresh", post(refresh_feed))
        .route("/api/draft", post(generate_draft))
        .route("/api/assistant/chats", get(list_chats).post(create_chat))
        .route("/api/assistant/chats/{id}", delete(delete_chat))
        .route("/api/assistant/chats/{id}/messages", post(send_message))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "syncflo"
    }))
}

// ── Emails ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmailListResponse {
    emails: Vec<Email>,
    total: usize,
    showing: usize,
}

async fn list_emails(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Response {
    let (filter, sort) = match query.parse() {
        Ok(parsed) => parsed,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let all = state.store.emails().await;
    let emails = apply(&all, &filter, sort);
    Json(EmailListResponse {
        total: all.len(),
        showing: emails.len(),
        emails,
    })
    .into_response()
}

async fn export_emails(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Response {
    let (filter, sort) = match query.parse() {
        Ok(parsed) => parsed,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let all = state.store.emails().await;
    let emails = apply(&all, &filter, sort);
    let csv = match export_csv(&emails) {
        Ok(csv) => csv,
        Err(e) => {
            error!(error = %e, "CSV export failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to export emails");
        }
    };

    let filename = export_filename(Utc::now().date_naive());
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    info!(rows = emails.len(), %filename, "Exported emails");
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response()
}

// ── Analytics ───────────────────────────────────────────────────────────

async fn analytics(State(state): State<AppState>) -> impl IntoResponse {
    Json(compute_analytics_stats(&state.store.emails().await))
}

async fn labels(State(state): State<AppState>) -> impl IntoResponse {
    Json(compute_label_stats(&state.store.emails().await))
}

async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(compute_dashboard_summary(&state.store.emails().await))
}

// ── Feed ────────────────────────────────────────────────────────────────

async fn feed_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    Json(serde_json::json!({
        "fetchedAt": snapshot.fetched_at,
        "lastError": snapshot.last_error,
        "count": snapshot.emails.len(),
    }))
}

async fn refresh_feed(State(state): State<AppState>) -> Response {
    match run_cycle(state.source.as_ref(), &state.store).await {
        CycleOutcome::Replaced { count } => Json(serde_json::json!({ "count": count })).into_response(),
        CycleOutcome::Failed(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
        CycleOutcome::Superseded => {
            error_response(StatusCode::CONFLICT, "Refresh superseded by a newer cycle")
        }
    }
}

// ── Draft ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DraftRequest {
    subject: Option<String>,
    sender: Option<String>,
    content: Option<String>,
}

async fn generate_draft(
    State(state): State<AppState>,
    request: Result<Json<DraftRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable draft request");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate draft");
        }
    };

    let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(subject), Some(sender), Some(body)) = (
        present(request.subject),
        present(request.sender),
        present(request.content),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let input = DraftInput {
        sender,
        subject,
        body,
    };
    match state.drafts.generate_reply(&input).await {
        Ok(draft) => Json(draft).into_response(),
        Err(e) => {
            error!(error = %e, "Draft generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate draft")
        }
    }
}

// ── Assistant ───────────────────────────────────────────────────────────

async fn list_chats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.assistant.history().chats().await)
}

async fn create_chat(State(state): State<AppState>) -> Response {
    match state.assistant.history().new_chat(GREETING).await {
        Ok(chat) => (StatusCode::CREATED, Json(chat)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to create chat");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save chat history")
        }
    }
}

async fn delete_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.assistant.history().delete_chat(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("Chat not found: {id}")),
        Err(e) => {
            error!(error = %e, chat_id = %id, "Failed to delete chat");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save chat history")
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    images: Vec<ImagePayload>,
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<MessageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    if request.message.trim().is_empty() && request.images.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is empty");
    }

    let mut images = Vec::with_capacity(request.images.len());
    for payload in request.images {
        match BASE64.decode(payload.data.as_bytes()) {
            Ok(data) => images.push(ImagePart {
                mime_type: payload.mime_type,
                data,
            }),
            Err(e) => {
                warn!(error = %e, "Rejected image with invalid base64");
                return error_response(StatusCode::BAD_REQUEST, "Invalid image data");
            }
        }
    }

    match state.assistant.respond(&id, &request.message, images).await {
        Ok(reply) => Json(serde_json::json!({ "reply": reply })).into_response(),
        Err(AssistantError::ChatNotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, format!("Chat not found: {id}"))
        }
        Err(AssistantError::Llm(LlmError::InvalidRequest { reason, .. })) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(AssistantError::History(e)) => {
            error!(error = %e, "Failed to save chat history");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save chat history")
        }
        Err(e) => {
            error!(error = %e, chat_id = %id, "Assistant failed to respond");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::assistant::ChatHistoryStore;
    use crate::draft::DraftConfig;
    use crate::error::FeedError;
    use crate::feed::parse_emails;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};

    const CSV: &str = "\
Sender Email,Subject,Summary,Label,Category,Processed At,Sync Status
a@x.com,Hi,Sum,Work,inbox,2024-01-01T10:00:00Z,synced
b@y.com,Yo,Sum2,Personal,sent,2024-01-02T10:00:00Z,failed
";

    struct StaticSource(Result<&'static str, u16>);

    #[async_trait]
    impl EmailSource for StaticSource {
        async fn fetch_emails(&self) -> Result<Vec<Email>, FeedError> {
            match self.0 {
                Ok(text) => parse_emails(text, Utc::now()),
                Err(status) => Err(FeedError::Network {
                    status,
                    status_text: "Internal Server Error".into(),
                }),
            }
        }
    }

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
            })
        }
    }

    async fn app(source: StaticSource, reply: &'static str) -> (Router, AppState) {
        let llm: Arc<dyn LlmProvider> = Arc::new(FixedLlm(reply));
        let state = AppState {
            store: EmailStore::new(),
            source: Arc::new(source),
            drafts: Arc::new(DraftGenerator::new(llm.clone(), DraftConfig::default())),
            assistant: Arc::new(Assistant::new(llm, ChatHistoryStore::in_memory())),
        };
        run_cycle(state.source.as_ref(), &state.store).await;
        (routes(state.clone()), state)
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn emails_are_filtered_and_counted() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;

        let (status, body) = call(&router, get("/api/emails?category=sent")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["showing"], 1);
        assert_eq!(body["emails"][0]["sender"], "b@y.com");

        let (status, body) = call(&router, get("/api/emails?sort=processedAt&direction=desc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["emails"][0]["id"], "email-2");
    }

    #[tokio::test]
    async fn bad_view_query_is_rejected() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;
        let (status, body) = call(&router, get("/api/emails?date=yesterday")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("yesterday"));
    }

    #[tokio::test]
    async fn analytics_reflect_snapshot() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;
        let (_, body) = call(&router, get("/api/analytics")).await;
        assert_eq!(body["totalEmails"], 2);
        assert_eq!(body["failedSyncs"], 1);

        let (_, body) = call(&router, get("/api/labels")).await;
        assert_eq!(body[0]["label"], "Work");
        assert_eq!(body[0]["percentage"], 50.0);
    }

    #[tokio::test]
    async fn failed_refresh_reports_and_keeps_nothing_new() {
        let (router, state) = app(StaticSource(Err(500)), "").await;

        let (status, body) = call(&router, Request::post("/api/feed/refresh").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch CSV: 500 Internal Server Error");

        let (_, body) = call(&router, get("/api/feed/status")).await;
        assert_eq!(body["count"], 0);
        assert!(body["fetchedAt"].is_null());
        assert!(state.store.snapshot().await.last_error.is_some());
    }

    #[tokio::test]
    async fn draft_requires_all_fields() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;
        let (status, body) = call(
            &router,
            post_json("/api/draft", serde_json::json!({"subject": "Hi", "sender": "a@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn unusable_draft_is_a_server_error() {
        let (router, _) = app(StaticSource(Ok(CSV)), "not json").await;
        let (status, body) = call(
            &router,
            post_json(
                "/api/draft",
                serde_json::json!({"subject": "Hi", "sender": "a@x.com", "content": "Sum"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate draft");
    }

    #[tokio::test]
    async fn unreadable_draft_body_gets_json_error() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;
        let request = Request::post("/api/draft")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate draft");

        let request = Request::post("/api/draft").body(Body::from("subject=Hi")).unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate draft");
    }

    #[tokio::test]
    async fn unreadable_message_body_is_bad_request() {
        let (router, _) = app(StaticSource(Ok(CSV)), "ok").await;
        let (_, chat) = call(&router, Request::post("/api/assistant/chats").body(Body::empty()).unwrap()).await;
        let uri = format!("/api/assistant/chats/{}/messages", chat["id"].as_str().unwrap());

        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("[1, 2"))
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn assistant_message_errors() {
        let (router, _) = app(StaticSource(Ok(CSV)), "ok").await;

        let (status, _) = call(
            &router,
            post_json("/api/assistant/chats/chat-missing/messages", serde_json::json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, chat) = call(&router, Request::post("/api/assistant/chats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/assistant/chats/{}/messages", chat["id"].as_str().unwrap());

        let (status, body) = call(
            &router,
            post_json(
                &uri,
                serde_json::json!({"message": "what?", "images": [{"mimeType": "image/png", "data": "%%%"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid image data");

        let (status, _) = call(&router, post_json(&uri, serde_json::json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deleting_unknown_chat_is_not_found() {
        let (router, _) = app(StaticSource(Ok(CSV)), "").await;
        let response = router
            .clone()
            .oneshot(Request::delete("/api/assistant/chats/chat-nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
