//! Error types for the observer API.
//!
//! [`ObserverError`] converts into an HTTP response whose JSON body always
//! carries a machine-readable `reason` next to the human-readable `error`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use draftday_core::error::DraftError;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The engine rejected or failed the operation.
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ObserverError {
    /// Machine-readable reason code.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Draft(e) => e.reason(),
            Self::InvalidUuid(_) => "invalid_request",
            Self::Serialization(_) => "internal",
        }
    }

    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Draft(e) => match e {
                DraftError::NotFound { .. } => StatusCode::NOT_FOUND,
                DraftError::InvalidState { .. }
                | DraftError::WrongTurn { .. }
                | DraftError::ItemUnavailable { .. }
                | DraftError::PoolExhausted { .. } => StatusCode::CONFLICT,
                DraftError::EligibilityViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DraftError::PersistenceFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
                DraftError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            },
            Self::InvalidUuid(_) => StatusCode::BAD_REQUEST,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, reason = self.reason(), "request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "reason": self.reason(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
