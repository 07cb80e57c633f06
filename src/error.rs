//! Error taxonomy and centralized HTTP translation.
//!
//! DESIGN
//! ======
//! Every fallible operation in the store, engine, and gate returns `ApiError`.
//! The single `IntoResponse` impl below is the one place errors become HTTP:
//! known kinds map to 400/403/404 with a grepable code, and nothing else can
//! leak through because nothing else is an error type in this crate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The three error kinds a rejected mutation can surface as.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input, invalid item text, or an illegal
    /// state-transition attempt (no items, no votes).
    #[error("{0}")]
    BadRequest(String),
    /// Non-admin attempting an admin action, a banned address joining,
    /// or a vote from a name not in the room.
    #[error("{0}")]
    Forbidden(String),
    /// Unknown room id, or a ban target that is not a current participant.
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Grepable machine code included in every error body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { code: self.code(), message: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}
