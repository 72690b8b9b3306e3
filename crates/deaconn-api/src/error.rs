use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use deaconn_types::api::ErrorBody;

/// Every handler failure. The response body is a titled banner; internal
/// detail is logged and never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// DB errors from a write. Constraint violations are the caller's fault.
    pub fn from_write(err: anyhow::Error, what: &str) -> Self {
        if deaconn_db::is_constraint_violation(&err) {
            ApiError::Conflict(format!("{what} conflicts with an existing record"))
        } else {
            ApiError::Internal(err)
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", "Invalid Input", msg.clone())
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Not Signed In",
                "You must be signed in to do that.".into(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "No Permissions",
                "You do not have permission to do that.".into(),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Not Found",
                format!("{what} not found."),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", "Conflict", msg.clone()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Error",
                "Something went wrong. Please try again later.".into(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!("Internal error: {:#}", err);
        }

        let (status, code, title, message) = self.parts();
        let body = ErrorBody {
            code: code.to_string(),
            title: title.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
