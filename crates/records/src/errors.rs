use thiserror::Error;

use crate::models::EntityKind;

/// Failure of a backend round trip.
///
/// Transport failures, constraint violations and missing targets all carry a
/// human-readable message in their `Display` text, which is what callers
/// surface to the user.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        ServiceError::NotFound(format!("{} {id}", kind.singular()))
    }

    /// A constraint violation as Postgres reports it (HTTP 409).
    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Backend {
            status: 409,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Transport(e) => e.status().map(|s| s.as_u16()),
            ServiceError::Backend { status, .. } => Some(*status),
            ServiceError::NotFound(_) => Some(404),
            ServiceError::InvalidInput(_) | ServiceError::Json(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
