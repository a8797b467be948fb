//! Typed failures and their mapping onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Terminal outcomes of the signup/signin flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email in use")]
    EmailInUse,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("stored credential is malformed")]
    InvalidCredentialFormat,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stores report failures through `anyhow`; a store may smuggle a typed
    /// `AuthError` (e.g. a unique-index conflict) inside it.
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast::<AuthError>() {
            Ok(auth) => auth,
            Err(other) => AuthError::Internal(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::EmailInUse) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::UserNotFound) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::InvalidCredentials) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::InvalidCredentialFormat)
            | ApiError::Auth(AuthError::Internal(_))
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Auth(AuthError::EmailInUse) => "email_in_use",
            ApiError::Auth(AuthError::UserNotFound) => "user_not_found",
            ApiError::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            ApiError::Auth(AuthError::InvalidCredentialFormat)
            | ApiError::Auth(AuthError::Internal(_))
            | ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            // details stay in the logs
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
