use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::validation::FieldError;

/// Every failure a request can end in. Each variant maps to one status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    InvalidInput {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error("User already exists")]
    DuplicateUser,
    #[error("Authentication token is required")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Server error")]
    Internal { cause: anyhow::Error, expose: bool },
}

impl ApiError {
    pub fn invalid(errors: Vec<FieldError>) -> Self {
        ApiError::InvalidInput {
            message: "Invalid input".into(),
            errors,
        }
    }

    pub fn invalid_message(message: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn internal(cause: impl Into<anyhow::Error>, expose: bool) -> Self {
        ApiError::Internal {
            cause: cause.into(),
            expose,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput { .. } | ApiError::DuplicateUser => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::InvalidToken | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let body = match self {
            ApiError::InvalidInput { errors, .. } => ErrorBody {
                message,
                errors,
                details: None,
            },
            ApiError::Internal { cause, expose } => {
                let detail = format!("{:#}", cause);
                error!(error = %detail, "request failed");
                ErrorBody {
                    message,
                    errors: Vec::new(),
                    details: expose.then_some(detail),
                }
            }
            _ => ErrorBody {
                message,
                errors: Vec::new(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(vec![FieldError::new("body", &rejection.body_text())])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid(vec![FieldError::new("query", &rejection.body_text())])
    }
}

/// `Json` body extractor whose rejections are reported as `InvalidInput`.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query-string counterpart of [`ApiJson`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
