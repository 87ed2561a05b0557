//! Error handler for accounta.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::image::ImageError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error("error reading multipart form data")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("invalid email or password")]
    BadCredentials,

    #[error("missing or invalid 'Authorization' header")]
    Unauthorized,

    #[error("caller is not allowed to manage this resource")]
    Forbidden,

    #[error("internal server error, {details}")]
    Internal { details: String },
}

/// Errors surfaced by the record stores, shared by the Postgres
/// repositories and the in-memory test doubles.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    Conflict,

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            err => {
                if err
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    StoreError::Conflict
                } else {
                    StoreError::Database(err.to_string())
                }
            },
        }
    }
}

/// JSON error envelope: `{"status": "error", "message": ...}`.
#[derive(Debug, Serialize)]
struct ResponseError {
    status: &'static str,
    message: String,
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Multipart(_) => StatusCode::BAD_REQUEST,
            ServerError::Image(err) => match err {
                ImageError::NotFound
                | ImageError::Store(StoreError::NotFound) => {
                    StatusCode::NOT_FOUND
                },
                _ => StatusCode::BAD_REQUEST,
            },
            ServerError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            ServerError::Store(_) => StatusCode::BAD_REQUEST,
            ServerError::BadCredentials | ServerError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            },
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::Crypto(_) | ServerError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ServerError::Validation(errors) => parse_validation_errors(errors),
            ServerError::Json(rejection) => rejection.body_text(),
            ServerError::Crypto(_) | ServerError::Internal { .. } => {
                "Internal server error.".to_owned()
            },
            other => other.to_string(),
        }
    }
}

fn parse_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues
                .iter()
                .map(move |issue| format!("{field}: {issue}"))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    fields.sort();
    fields.join("; ")
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");
            },
            ServerError::Crypto(err) => {
                tracing::error!(error = %err, "cryptographic failure");
            },
            _ => {},
        }

        let body = ResponseError {
            status: "error",
            message: self.message(),
        };

        match serde_json::to_string(&body) {
            Ok(body) => Response::builder()
                .status(self.status_code())
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
                .unwrap_or_else(|_| internal_server_error()),
            Err(_) => internal_server_error(),
        }
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "status": "error",
                "message": "Internal server error.",
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
