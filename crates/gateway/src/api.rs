//! Chat, revision, session, and export handlers.
//!
//! `/chat` and `/revise` accept the same loose body forms: a JSON object
//! (`message` or `text`), a bare JSON string, or raw text when the request
//! is not `application/json`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use reflexion_agent::{LoopRequest, RevisionInput, StepRecord};
use reflexion_core::error::{Error, GenerationError};
use reflexion_core::session::ChatEntry;
use reflexion_sessions::{render_transcript, transcript_filename};

use crate::SharedState;

/// Session used when a request names none.
pub const DEFAULT_SESSION: &str = "default";

const PREVIEW_CHARS: usize = 100;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &str, message: Option<&str>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.map(str::to_string),
        }),
    )
}

fn bad_request(error: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, error, None)
}

fn not_found(error: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, error, None)
}

/// HTTP status for a loop or storage failure.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Cancelled | Error::Generation(GenerationError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        Error::Generation(GenerationError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log the failure and build a generic body. Diagnostics never reach the
/// client.
fn failure(context: &str, err: &Error, message: &str) -> ApiError {
    let status = status_for(err);
    error!(context, status = status.as_u16(), error = %err, "Request failed");

    match status {
        StatusCode::BAD_REQUEST => bad_request("No message provided"),
        StatusCode::GATEWAY_TIMEOUT => api_error(status, "Request timed out", Some(message)),
        _ => api_error(status, "Internal server error", Some(message)),
    }
}

// --- Request parsing ---

/// A chat or revision request after body normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingMessage {
    pub text: String,
    pub session_id: Option<String>,
    pub trace: bool,
}

#[derive(Deserialize)]
struct MessageObject {
    message: Option<String>,
    text: Option<String>,
    session_id: Option<String>,
    #[serde(default)]
    trace: bool,
}

impl IncomingMessage {
    /// Normalize a request body. Non-JSON bodies are taken as raw text.
    pub fn parse(is_json: bool, body: &str) -> Result<Self, &'static str> {
        if !is_json {
            return Ok(Self {
                text: body.to_string(),
                ..Default::default()
            });
        }

        let value: serde_json::Value = serde_json::from_str(body).map_err(|_| "Invalid input format")?;
        match value {
            serde_json::Value::String(text) => Ok(Self {
                text,
                ..Default::default()
            }),
            value @ serde_json::Value::Object(_) => {
                let obj: MessageObject = serde_json::from_value(value).map_err(|_| "Invalid input format")?;
                Ok(Self {
                    text: obj.message.or(obj.text).unwrap_or_default(),
                    session_id: obj.session_id,
                    trace: obj.trace,
                })
            }
            _ => Err("Invalid input format"),
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

// --- POST /chat ---

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<StepRecord>>,
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ChatResponse>, ApiError> {
    let incoming = IncomingMessage::parse(is_json(&headers), &body).map_err(bad_request)?;
    if incoming.text.trim().is_empty() {
        return Err(bad_request("No message provided"));
    }

    let session_id = incoming
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    info!(session_id = %session_id, message = %preview(&incoming.text), "Chat message received");

    state
        .sessions
        .append(&session_id, ChatEntry::user(&incoming.text))
        .await
        .map_err(|e| failure("chat", &Error::from(e), "Failed to process query"))?;

    let request = LoopRequest::new(incoming.text).with_trace(incoming.trace);
    let result = state
        .agent
        .run(request)
        .await
        .map_err(|e| failure("chat", &e, "Failed to process query"))?;

    state
        .sessions
        .append(&session_id, ChatEntry::ai(&result.final_answer, result.iterations))
        .await
        .map_err(|e| failure("chat", &Error::from(e), "Failed to process query"))?;

    info!(session_id = %session_id, iterations = result.iterations, "Chat answered");

    Ok(Json(ChatResponse {
        response: result.final_answer,
        session_id,
        timestamp: Utc::now(),
        iterations: result.iterations,
        trace: result.trace,
    }))
}

// --- POST /revise ---

#[derive(Debug, Serialize)]
pub struct ReviseResponse {
    pub response: String,
    pub original: String,
    pub critique: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn revise_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ReviseResponse>, ApiError> {
    let incoming = IncomingMessage::parse(is_json(&headers), &body).map_err(bad_request)?;
    if incoming.text.trim().is_empty() {
        return Err(bad_request("No revision input provided"));
    }

    info!(input = %preview(&incoming.text), "Revision request received");

    let input = RevisionInput::parse(&incoming.text);
    let result = state
        .agent
        .run(LoopRequest::new(input.to_prompt()))
        .await
        .map_err(|e| failure("revise", &e, "Failed to process revision request"))?;

    Ok(Json(ReviseResponse {
        response: result.final_answer,
        original: input.original,
        critique: input.critique,
        timestamp: Utc::now(),
    }))
}

// --- GET /sessions, GET /sessions/{id} ---

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: BTreeMap<String, SessionInfo>,
}

pub async fn list_sessions_handler(
    State(state): State<SharedState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let summaries = state
        .sessions
        .list()
        .await
        .map_err(|e| failure("sessions", &Error::from(e), "Failed to list sessions"))?;

    let sessions = summaries
        .into_iter()
        .map(|s| {
            (
                s.id,
                SessionInfo {
                    message_count: s.message_count,
                    created_at: s.created_at,
                },
            )
        })
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
}

pub async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .map_err(|e| failure("sessions", &Error::from(e), "Failed to load session"))?
        .ok_or_else(|| not_found("Session not found"))?;

    Ok(Json(SessionResponse {
        session_id: session.id,
        messages: session.messages,
        created_at: session.created_at,
    }))
}

// --- POST /export-chat ---

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub transcript: String,
    pub session_id: String,
    pub message_count: usize,
    pub filename: String,
}

pub async fn export_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let session_id = payload
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let Some(session) = state
        .sessions
        .get(&session_id)
        .await
        .map_err(|e| failure("export", &Error::from(e), "Failed to export chat"))?
    else {
        warn!(session_id = %session_id, "Export requested for unknown session");
        return Err(not_found("Session not found"));
    };

    Ok(Json(ExportResponse {
        transcript: render_transcript(&session),
        filename: transcript_filename(&session.id),
        message_count: session.messages.len(),
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_body() {
        let msg = IncomingMessage::parse(false, "What is Rust?").unwrap();
        assert_eq!(msg.text, "What is Rust?");
        assert_eq!(msg.session_id, None);
        assert!(!msg.trace);
    }

    #[test]
    fn json_string_body() {
        let msg = IncomingMessage::parse(true, r#""What is Rust?""#).unwrap();
        assert_eq!(msg.text, "What is Rust?");
    }

    #[test]
    fn json_object_prefers_message_over_text() {
        let msg = IncomingMessage::parse(
            true,
            r#"{"message":"from message","text":"from text","session_id":"s1","trace":true}"#,
        )
        .unwrap();
        assert_eq!(msg.text, "from message");
        assert_eq!(msg.session_id.as_deref(), Some("s1"));
        assert!(msg.trace);

        let msg = IncomingMessage::parse(true, r#"{"text":"from text"}"#).unwrap();
        assert_eq!(msg.text, "from text");
    }

    #[test]
    fn object_without_text_is_empty() {
        let msg = IncomingMessage::parse(true, r#"{"session_id":"s1"}"#).unwrap();
        assert!(msg.text.is_empty());
    }

    #[test]
    fn other_json_shapes_rejected() {
        assert_eq!(IncomingMessage::parse(true, "[1,2]"), Err("Invalid input format"));
        assert_eq!(IncomingMessage::parse(true, "{not json"), Err("Invalid input format"));
        assert_eq!(IncomingMessage::parse(true, r#"{"message":5}"#), Err("Invalid input format"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&Error::Generation(GenerationError::RateLimited { retry_after_secs: 5 })),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&Error::Generation(GenerationError::Timeout("slow".into()))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(status_for(&Error::Cancelled), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&Error::Generation(GenerationError::Network("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&Error::InvalidInput("blank".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
