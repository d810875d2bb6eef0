//! Server error type and its HTTP rendering

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tessera_core::{AccessError, CollaboratorError};

/// Errors a request handler can return
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Missing or unknown issuer credential
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Malformed request body or header
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// A collaborator the request depends on is down
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// Outcome of an access-code operation
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl ServerError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ServerError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ServerError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ServerError::Access(e) => (access_status(e), e.code()),
        }
    }
}

fn access_status(error: &AccessError) -> StatusCode {
    match error {
        AccessError::NotFound | AccessError::ResourceUnavailable(_) => StatusCode::NOT_FOUND,
        AccessError::Expired
        | AccessError::Invalidated
        | AccessError::SessionNotFound
        | AccessError::SessionExpired
        | AccessError::SessionRevoked => StatusCode::UNAUTHORIZED,
        AccessError::Exhausted | AccessError::Forbidden | AccessError::DeviceMismatch => {
            StatusCode::FORBIDDEN
        }
        AccessError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AccessError::DelegationFailed(_) | AccessError::CatalogUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AccessError::GenerationExhausted { .. } | AccessError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<CollaboratorError> for ServerError {
    fn from(error: CollaboratorError) -> Self {
        Self::Unavailable {
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Error response JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            // Details of infrastructure faults stay in the logs
            ServerError::Access(AccessError::Store(e)) => {
                tracing::error!(error = %e, "Storage failure while handling request");
                "storage temporarily unavailable".to_string()
            }
            ServerError::Unavailable { message } => {
                tracing::error!(error = %message, "Collaborator unavailable");
                "service temporarily unavailable".to_string()
            }
            ServerError::Access(e @ AccessError::GenerationExhausted { .. }) => {
                tracing::error!(error = %e, "Code generation exhausted");
                e.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
