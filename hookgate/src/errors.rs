use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Body of every rejection, whatever the underlying reason
pub const REJECTION_BODY: &str = "could not process";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Webhook could not be authenticated (unreadable body, missing or bad signature, unknown
    /// provider). The reason is for logs only.
    #[error("Webhook rejected: {reason}")]
    Rejected { reason: String },

    /// Webhook was authenticated but the handler kept failing
    #[error("Webhook processing failed after {attempts} attempt(s): {last_error}")]
    ProcessingFailed {
        last_error: String,
        attempts: u32,
        /// Answer 202 instead of 500, leaving redelivery to our own follow-up
        accepted: bool,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        Error::Rejected { reason: reason.to_string() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Rejected { .. } => StatusCode::BAD_REQUEST,
            Error::ProcessingFailed { accepted: true, .. } => StatusCode::ACCEPTED,
            Error::ProcessingFailed { accepted: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a sender-safe error message, without leaking why verification or processing failed
    pub fn user_message(&self) -> String {
        match self {
            Error::Rejected { .. } => REJECTION_BODY.to_string(),
            Error::ProcessingFailed { accepted: true, .. } => "queued".to_string(),
            Error::ProcessingFailed { accepted: false, .. } => "failed".to_string(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::ProcessingFailed { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Rejected { .. } => {
                tracing::info!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::ProcessingFailed { .. } => (status, Json(json!({ "status": self.user_message() }))).into_response(),
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
