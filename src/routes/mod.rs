//! API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::Message;
use crate::core::{lock_now, SessionError, TurnOutcome};
use crate::AppState;

const CHAT_PAGE: &str = include_str!("page.html");

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonaResponse {
    pub title: String,
    pub placeholder: String,
    pub thinking: String,
    pub questions: Vec<String>,
    pub translation_label: String,
    pub translation_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    pub messages: Vec<Message>,
}

/// Errors returned to API callers as `{"error": ...}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unknown session: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} is busy with another message")]
    SessionBusy(Uuid),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::SessionNotFound(id),
            SessionError::Busy(id) => ApiError::SessionBusy(id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SessionBusy(_) => StatusCode::CONFLICT,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn persona(State(state): State<AppState>) -> Json<PersonaResponse> {
    let persona = &state.persona;
    Json(PersonaResponse {
        title: persona.persona.name.clone(),
        placeholder: persona.persona.placeholder.clone(),
        thinking: persona.persona.thinking.clone(),
        questions: persona.examples.questions.clone(),
        translation_label: persona.translation.label.clone(),
        translation_enabled: state.chat_engine.translation_enabled(),
    })
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, _) = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conversation = state
        .sessions
        .get(&session_id)
        .await
        .ok_or(ApiError::SessionNotFound(session_id))?;

    // a running turn would block the read until both remote calls finish
    let messages = lock_now(&session_id, &conversation)?.messages.clone();
    Ok(Json(SessionResponse {
        session_id,
        messages,
    }))
}

async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> Json<MessageResponse> {
    let conversation = state.sessions.get_or_create(session_id).await;
    // held for the whole turn: one user action per session at a time
    let mut conversation = conversation.lock().await;

    let outcome = state
        .chat_engine
        .run_turn(&mut conversation, &request.message)
        .await;

    tracing::info!(
        "Session {}: reply={} translation={} notices={} turns={}",
        session_id,
        outcome.reply.is_some(),
        outcome.translation.is_some(),
        outcome.notices.len(),
        conversation.len()
    );

    Json(MessageResponse {
        outcome,
        messages: conversation.messages.clone(),
    })
}

async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.clear(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/v1/persona", get(persona))
        .route("/v1/sessions", post(create_session))
        .route(
            "/v1/sessions/:session_id",
            get(get_session).delete(clear_session),
        )
        .route("/v1/sessions/:session_id/messages", post(send_message))
}
