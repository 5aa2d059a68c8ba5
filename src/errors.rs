//! Typed error hierarchy for the help-desk back-end.
//!
//! `DeskError` is shared by the storage layer and the HTTP handlers; its
//! `IntoResponse` impl renders the `{ data: null, message, errors? }`
//! envelope with the matching status code.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Field name -> human readable messages, as returned to form clients.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type DeskResult<T> = Result<T, DeskError>;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: FieldErrors,
    },

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Duplicate { message: String, field: &'static str },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeskError {
    /// A 400 with a single message and no field errors.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: FieldErrors::new(),
        }
    }

    /// A 400 pointing at one field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        Self::Validation { message, errors }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn requires_super_admin() -> Self {
        Self::Forbidden("This action requires super admin privileges".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Duplicate { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LockPoisoned | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Other(anyhow::Error::new(err).context("Database error"))
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation { message, errors } if !errors.is_empty() => serde_json::json!({
                "data": null,
                "message": message,
                "errors": errors,
            }),
            Self::Duplicate { message, field } => {
                let mut errors = FieldErrors::new();
                errors.insert(field.to_string(), vec![message.clone()]);
                serde_json::json!({"data": null, "message": message, "errors": errors})
            }
            Self::LockPoisoned | Self::Other(_) => {
                tracing::error!(error = ?self, "request failed");
                serde_json::json!({"data": null, "message": "Internal server error"})
            }
            _ => serde_json::json!({"data": null, "message": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}
