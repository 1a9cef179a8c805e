use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::arena::{ArenaError, InvalidStation},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A store read or write failed.
    #[error("storage failure: {0}")]
    Persistence(#[from] StorageError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The arena rejected the mutation.
    #[error(transparent)]
    Arena(#[from] ArenaError),
    /// Requested resource was not found.
    #[error("{0}")]
    NotFound(String),
}

/// Rejection of a match play command, sent back to the issuing client as its error text.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The envelope named a command nobody handles.
    #[error("Invalid message type '{0}'")]
    UnknownType(String),
    /// The envelope payload did not match the command.
    #[error("Failed to parse '{kind}' message: {source}")]
    ParseFailed {
        /// Command name.
        kind: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The payload named an unknown station.
    #[error(transparent)]
    InvalidStation(#[from] InvalidStation),
    /// The arena refused the command.
    #[error("{context}: {source}")]
    Rejected {
        /// Operator-facing prefix, e.g. `Cannot start match`.
        context: &'static str,
        /// Why the command was refused.
        #[source]
        source: ServiceError,
    },
}

impl CommandError {
    /// Wrap a service failure with the operator-facing prefix of the command.
    pub fn rejected(context: &'static str, source: impl Into<ServiceError>) -> Self {
        CommandError::Rejected {
            context,
            source: source.into(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Persistence(StorageError::Conflict(message)) => {
                AppError::Conflict(format!("{message} already exists"))
            }
            ServiceError::Persistence(source) => AppError::Internal(source.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::Arena(source) => AppError::Conflict(source.to_string()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
