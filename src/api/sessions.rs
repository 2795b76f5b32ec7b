//! Session endpoints: create, read, reset, and run text or voice turns

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiState;
use crate::conversation::Turn;
use crate::orchestrator::{TurnError, TurnOutcome};
use crate::voice::{AudioBlob, AudioFormat};

/// Largest accepted recording (the Whisper upload limit)
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", delete(delete_session))
        .route("/{id}/messages", get(messages))
        .route("/{id}/reset", post(reset_session))
        .route("/{id}/text", post(text_turn))
        .route(
            "/{id}/voice",
            post(voice_turn).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .with_state(state)
}

/// Newly created session
#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

async fn create_session(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create();
    let session = session.lock().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            id: session.id(),
            created_at: session.created_at(),
        }),
    )
}

async fn delete_session(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Full transcript of a session, oldest first
async fn messages(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let session = state.sessions.get(id)?;
    let session = session.lock().await;
    Ok(Json(session.transcript().turns().to_vec()))
}

async fn reset_session(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get(id)?;
    session.lock().await.reset();
    Ok(StatusCode::NO_CONTENT)
}

/// Typed question
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Completed turn
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub user: Turn,
    pub assistant: Turn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<SpeechPayload>,
}

/// Synthesized reply, inlined for the page's audio element
#[derive(Debug, Serialize)]
pub struct SpeechPayload {
    pub mime: &'static str,
    /// Base64-encoded audio
    pub data: String,
}

async fn text_turn(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TextRequest>,
) -> Result<Response, ApiError> {
    let session = state.sessions.get(id)?;
    let mut session = session.lock().await;

    match state.orchestrator.handle_text(&mut session, &request.text).await? {
        Some(outcome) => Ok(Json(TurnResponse::from(outcome)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Voice turn options
#[derive(Debug, Deserialize)]
pub struct VoiceParams {
    /// Synthesize the reply (default true)
    pub speak: Option<bool>,
}

/// Transcribe a recording and answer it
///
/// Accepts any audio container Whisper understands; the format is taken from
/// `Content-Type` (WAV when absent).
async fn voice_turn(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<VoiceParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let format = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(AudioFormat::from_mime)
        .unwrap_or_default();
    let audio = AudioBlob::new(body.to_vec(), format);

    let session = state.sessions.get(id)?;
    let mut session = session.lock().await;

    let speak = params.speak.unwrap_or(true);
    match state.orchestrator.handle_audio(&mut session, &audio, speak).await? {
        Some(outcome) => Ok(Json(TurnResponse::from(outcome)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let audio = outcome.speech.map(|speech| SpeechPayload {
            mime: speech.format.mime(),
            data: base64::engine::general_purpose::STANDARD.encode(speech.bytes),
        });

        Self {
            user: outcome.user,
            assistant: outcome.assistant,
            audio,
        }
    }
}

/// Session API errors
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Turn(TurnError),
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::SessionNotFound(id) => Self::NotFound(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self::Turn(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: String,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found".to_string(),
                format!("session not found: {id}"),
            ),
            Self::Turn(e) => (
                StatusCode::BAD_GATEWAY,
                format!("{}_failed", e.stage),
                e.user_message().to_string(),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal".to_string(), msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
