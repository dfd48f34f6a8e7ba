//! Error types for the authoring core and the relay.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::ChapterStatus;

/// The one message shown to the user once the vendor quota is gone.
pub const QUOTA_EXHAUSTED_MESSAGE: &str =
    "Quota limit reached: the API key has no remaining usage (error 429).";

/// Failures of a generation request or of the workflow driving it.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Normalized quota failure, surfaced after retries ran out
    #[error("QUOTA_EXHAUSTED")]
    QuotaExhausted,

    /// Vendor or relay answered 429 / RESOURCE_EXHAUSTED
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 5xx from the vendor or the relay
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Timed out or the connection dropped before a response arrived
    #[error("Request aborted: {0}")]
    Aborted(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-retryable HTTP status from the vendor or the relay
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The AI answered, but not in the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No API key configured; set one in the settings first")]
    MissingCredential,

    #[error("Session expired; sign in again")]
    NotSignedIn,

    #[error("Chapter cannot move from {from} to {to}")]
    InvalidTransition {
        from: ChapterStatus,
        to: ChapterStatus,
    },

    #[error("Chapter {0} not found")]
    ChapterNotFound(String),

    #[error("A completed chapter cannot have empty content")]
    EmptyContent,

    #[error("Image generation unavailable: {0}")]
    ImageUnavailable(String),
}

impl GenerationError {
    /// Classify an HTTP failure by status code and vendor message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || is_quota_text(&message) {
            GenerationError::RateLimited(message)
        } else if (500..600).contains(&status) {
            GenerationError::Server { status, message }
        } else {
            GenerationError::Rejected { status, message }
        }
    }

    /// Classify a reqwest failure; timeouts and dropped connections are aborts.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_body() {
            GenerationError::Aborted(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            GenerationError::QuotaExhausted | GenerationError::RateLimited(_)
        )
    }

    /// Quota, 5xx and aborted requests are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.is_quota()
            || matches!(
                self,
                GenerationError::Server { .. } | GenerationError::Aborted(_)
            )
    }

    /// Stable kind carried in relay error bodies so clients can classify
    /// without relying on the HTTP status alone.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::QuotaExhausted => "QUOTA_EXHAUSTED",
            GenerationError::RateLimited(_) => "RATE_LIMITED",
            GenerationError::Server { .. } => "UPSTREAM_UNAVAILABLE",
            GenerationError::Aborted(_) => "UPSTREAM_ABORTED",
            GenerationError::Transport(_) => "TRANSPORT_ERROR",
            GenerationError::Rejected { .. } => "REJECTED",
            GenerationError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            GenerationError::MissingCredential => "MISSING_CREDENTIAL",
            GenerationError::NotSignedIn => "NOT_SIGNED_IN",
            GenerationError::InvalidTransition { .. } => "INVALID_TRANSITION",
            GenerationError::ChapterNotFound(_) => "CHAPTER_NOT_FOUND",
            GenerationError::EmptyContent => "EMPTY_CONTENT",
            GenerationError::ImageUnavailable(_) => "IMAGE_UNAVAILABLE",
        }
    }

    /// Rebuild an error from a relay reply. Retryable kinds keep their
    /// retryability, everything else comes back as a rejection.
    pub fn from_relay(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some("QUOTA_EXHAUSTED" | "RATE_LIMITED") => GenerationError::RateLimited(message),
            Some("UPSTREAM_UNAVAILABLE") => GenerationError::Server { status, message },
            Some("UPSTREAM_ABORTED") => GenerationError::Aborted(message),
            Some("MALFORMED_RESPONSE") => GenerationError::MalformedResponse(message),
            Some(_) => GenerationError::Rejected { status, message },
            None => Self::from_status(status, message),
        }
    }

    /// Text for the user-facing handler.
    pub fn user_message(&self) -> String {
        if self.is_quota() {
            QUOTA_EXHAUSTED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

fn is_quota_text(message: &str) -> bool {
    let lower = message.to_lowercase();
    message.contains("RESOURCE_EXHAUSTED") || lower.contains("quota") || message.contains("429")
}

/// Persistence failures. Remote ones are absorbed by the local fallback.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Remote store is not configured")]
    NotConfigured,

    #[error("Remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Remote store returned no rows")]
    EmptyResponse,

    #[error("Remote store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Local store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local store contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by the relay endpoints as `{success: false, error}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("GEMINI_API_KEY not found in environment variables")]
    MissingServerKey,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MissingServerKey => "MISSING_SERVER_KEY",
            ApiError::Generation(err) => err.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingServerKey => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Generation(err) if err.is_quota() => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Generation(GenerationError::Rejected { status, .. }) => {
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(StatusCode::is_client_error)
                    .unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Generation(
                GenerationError::Server { .. }
                | GenerationError::Aborted(_)
                | GenerationError::MalformedResponse(_),
            ) => StatusCode::BAD_GATEWAY,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
