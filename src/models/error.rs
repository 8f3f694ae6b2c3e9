use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::models::race_session::RaceStatus;

/// Domain-rule violations raised by the race core. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RaceError {
    #[error("invalid race configuration: {0}")]
    InvalidConfig(String),
    #[error("race session {0} not found")]
    NotFound(String),
    #[error("race session is full")]
    SessionFull,
    #[error("user has already joined this race")]
    AlreadyJoined,
    #[error("user is not a participant in this race")]
    NotAParticipant,
    #[error("race session is closed")]
    SessionClosed,
    #[error("cannot move race from {from} to {to}")]
    InvalidTransition { from: RaceStatus, to: RaceStatus },
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl RaceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::NotFound(_) => "NotFound",
            Self::SessionFull => "SessionFull",
            Self::AlreadyJoined => "AlreadyJoined",
            Self::NotAParticipant => "NotAParticipant",
            Self::SessionClosed => "SessionClosed",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Forbidden(_) => "Forbidden",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SessionFull
            | Self::AlreadyJoined
            | Self::NotAParticipant
            | Self::SessionClosed
            | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }
}

/// HTTP-facing error: a status code plus `{ "error", "message" }` body.
#[derive(Debug)]
pub struct Error {
    pub code: StatusCode,
    pub body: Json<Value>,
}

impl Error {
    pub fn new(code: StatusCode, kind: &str, message: &str) -> Self {
        Self {
            code,
            body: Json(json!({"error": kind, "message": message})),
        }
    }

    pub fn internal(message: &str) -> Self {
        tracing::error!("Internal error: {}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", message)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.code, self.body).into_response()
    }
}

impl From<(StatusCode, &str)> for Error {
    fn from((code, msg): (StatusCode, &str)) -> Self {
        let kind = code.canonical_reason().unwrap_or("Error");
        Self::new(code, kind, msg)
    }
}

impl From<RaceError> for Error {
    fn from(error: RaceError) -> Self {
        Self::new(error.status_code(), error.kind(), &error.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "InvalidConfig",
            &rejection.body_text(),
        )
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            &format!("Token validation failed: {}", error),
        )
    }
}
