use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;
use std::fmt;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

/// The one envelope every list endpoint answers with.
#[derive(Debug, Clone, Serialize)]
pub struct Listing<V> {
    pub data: Vec<V>,
    pub total: usize,
}

impl<V> Listing<V> {
    pub fn of(data: Vec<V>) -> Self {
        Self {
            total: data.len(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    MissingCredentials { message: String },
    InvalidSession { message: String },
    SessionExpired { message: String },
    AuthenticationFailure { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    InvalidPayload { message: String },
    Conflict { message: String },
    InternalError {
        #[serde(skip)]
        kind: &'static str,
        message: String,
    },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingCredentials { .. }
            | Error::InvalidSession { .. }
            | Error::SessionExpired { .. }
            | Error::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Error {
        Error::InvalidPayload {
            message: msg.into(),
        }
    }

    pub fn internal<S: Into<String>>(kind: &'static str, msg: S) -> Error {
        Error::InternalError {
            kind,
            message: msg.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::MissingCredentials { message }
            | Error::InvalidSession { message }
            | Error::SessionExpired { message }
            | Error::AuthenticationFailure { message }
            | Error::Forbidden { message }
            | Error::NotFound { message }
            | Error::InvalidPayload { message }
            | Error::Conflict { message }
            | Error::InternalError { message, .. } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InternalError { kind, message } => write!(f, "{}: {}", kind, message),
            other => write!(f, "{} ({})", other.message(), other.status()),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Error::InternalError { kind, message } => {
                log::error!("{}: {}", kind, message);
                Error::InternalError {
                    kind,
                    message: "Internal server error".to_string(),
                }
            }
            other => {
                log::debug!("request rejected with {}: {:?}", status, other);
                other
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError {
            kind: "SerializationError",
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(id: uuid::Error) -> Self {
        Self::InvalidPayload {
            message: format!("Malformed id: {}", id),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InternalError {
            kind: "TokenError",
            message: err.to_string(),
        }
    }
}

impl From<axum::http::header::InvalidHeaderValue> for Error {
    fn from(err: axum::http::header::InvalidHeaderValue) -> Self {
        Self::InternalError {
            kind: "HeaderError",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError {
            kind: "Unknown",
            message: err.to_string(),
        }
    }
}
