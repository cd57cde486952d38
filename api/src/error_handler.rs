//! HTTP error mapping for the API surface.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use retrieval::RetrievalError;
use serde::Serialize;
use thiserror::Error;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("not found")]
    NotFound,

    /// Request body failed extraction before reaching a handler.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// Errors from the retrieval pipeline, mapped per-variant below.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // startup-only
            AppError::MissingEnv(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,

            AppError::Retrieval(e) => match e {
                RetrievalError::InvalidQuery(_) | RetrievalError::InvalidCursor(_) => {
                    StatusCode::BAD_REQUEST
                }
                RetrievalError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                RetrievalError::SessionExpired(_) => StatusCode::GONE,
                RetrievalError::EmbeddingUnavailable | RetrievalError::NoResultsAvailable => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::MissingEnv(_) => "missing_env",
            AppError::Bind(_) => "bind_failed",
            AppError::Server(_) => "server_error",
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "invalid_request",
            AppError::Retrieval(e) => match e {
                RetrievalError::InvalidQuery(_) => "invalid_query",
                RetrievalError::InvalidCursor(_) => "invalid_cursor",
                RetrievalError::SessionNotFound(_) => "session_not_found",
                RetrievalError::SessionExpired(_) => "session_expired",
                RetrievalError::EmbeddingUnavailable => "embedding_unavailable",
                RetrievalError::NoResultsAvailable => "no_results_available",
                _ => "upstream_error",
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Structured error envelope returned to clients.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_errors_map_to_expected_statuses() {
        let cases = [
            (
                AppError::from(RetrievalError::InvalidQuery("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(RetrievalError::SessionNotFound("s".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(RetrievalError::SessionExpired("s".into())),
                StatusCode::GONE,
            ),
            (
                AppError::from(RetrievalError::EmbeddingUnavailable),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(RetrievalError::Qdrant("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
        }
    }
}
