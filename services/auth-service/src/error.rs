//! Service error taxonomy.
//!
//! Authentication failures deliberately collapse into one generic message so
//! callers cannot distinguish "unknown email" from "wrong password" or
//! "expired token" from "forged token". The specific reason is kept on the
//! variant for logging and tests, and never rendered to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors produced by the session lifecycle service and its stores.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed input, reported directly to the caller.
    #[error("{0}")]
    Validation(String),

    /// Duplicate username or email at registration.
    #[error("{0}")]
    Conflict(&'static str),

    /// Any authentication failure. Displays a single generic message.
    #[error("invalid credentials or token")]
    Unauthorized {
        /// Internal reason, for logs and tests only.
        reason: &'static str,
    },

    /// Account exists but is suspended or inactive.
    #[error("account is not active")]
    Forbidden,

    /// Persistence failure. Raw storage error text is never shown to clients.
    #[error("internal storage error")]
    Storage(#[from] sqlx::Error),

    /// Non-storage internal failure (e.g. signing or hashing).
    #[error("internal server error")]
    Internal(&'static str),
}

impl AuthError {
    /// Build an unauthorized error with an internal reason.
    #[must_use]
    pub const fn unauthorized(reason: &'static str) -> Self {
        Self::Unauthorized { reason }
    }

    /// Internal reason of an unauthorized error, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized { reason } => Some(reason),
            _ => None,
        }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "code": status.as_u16(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_display_is_generic() {
        let missing = AuthError::unauthorized("email not found");
        let wrong = AuthError::unauthorized("wrong password");
        assert_eq!(missing.to_string(), wrong.to_string());
        assert_eq!(missing.reason(), Some("email not found"));
        assert_eq!(wrong.reason(), Some("wrong password"));
    }

    #[test]
    fn test_storage_display_hides_source() {
        let err = AuthError::Storage(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "internal storage error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Conflict("dup").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }
}
