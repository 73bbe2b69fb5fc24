use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single failed field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

/// Every constraint that failed for one input value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, error: impl Into<String>) {
        self.0.push(FieldError {
            field,
            error: error.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|f| f.field)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fe) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", fe.field, fe.error)?;
        }
        Ok(())
    }
}

/// Errors returned by the stores and the authorization layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("attempted action is not allowed")]
    Forbidden,

    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("persistence failure during {op}")]
    Persistence {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        cause: Box<Error>,
        #[source]
        rollback: sqlx::Error,
    },
}

/// Coarse classification of [`Error`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidIdentifier,
    NotFound,
    Forbidden,
    AuthenticationFailure,
    Persistence,
    HashingFailure,
}

impl Error {
    pub fn persistence(op: &'static str, source: sqlx::Error) -> Self {
        Self::Persistence { op, source }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// A failed rollback reports the kind of the error that caused it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::InvalidId(_) => ErrorKind::InvalidIdentifier,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            Error::Persistence { .. } => ErrorKind::Persistence,
            Error::Hashing(_) => ErrorKind::HashingFailure,
            Error::RollbackFailed { cause, .. } => cause.kind(),
        }
    }

    fn is_unique_violation(&self) -> bool {
        match self {
            Error::Persistence { source, .. } => source
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation | ErrorKind::InvalidIdentifier => StatusCode::BAD_REQUEST,
            ErrorKind::AuthenticationFailure => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Persistence if self.is_unique_violation() => StatusCode::CONFLICT,
            ErrorKind::Persistence | ErrorKind::HashingFailure => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Error::Validation(fields) => json!({ "error": "data validation error", "fields": fields }),
            _ if status == StatusCode::CONFLICT => json!({ "error": "resource already exists" }),
            _ if status.is_server_error() => {
                error!(error = ?self, "request failed");
                json!({ "error": status.canonical_reason().unwrap_or("internal error") })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
