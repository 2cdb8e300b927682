//! Request gate: bearer-token authentication middleware and extractor.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::error::AuthError;
use crate::store::User;
use crate::AppState;

/// Authenticated identity for the current request.
///
/// Injected into request extensions by [`require_auth`]; retrieve it in
/// handlers as an extractor. Lives for the duration of one request and is
/// never persisted.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Middleware gating every protected route.
///
/// Extracts the bearer token, resolves the identity through the session
/// lifecycle service, injects it into request extensions, and dispatches
/// the detached last-used update before handing the request on.
///
/// # Errors
///
/// Returns unauthorized for a missing or malformed authorization header or
/// any token validation failure, and forbidden for non-active accounts.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?.to_string();

    let (user, record) = state.auth.authenticate(&token).await?;

    // Usage tracking must never block the request path.
    state.auth.touch_last_used_detached(&record);

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

/// Pull the bearer token out of an `Authorization` header.
///
/// # Errors
///
/// Returns unauthorized if the header is missing, not `Bearer`, or empty.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        warn!("authentication failed: missing authorization header");
        return Err(AuthError::unauthorized("missing authorization header"));
    };

    let value = value.to_str().map_err(|_| {
        warn!("authentication failed: non-ascii authorization header");
        AuthError::unauthorized("invalid authorization header")
    })?;

    let Some(token) = value.strip_prefix("Bearer ") else {
        warn!("authentication failed: authorization header is not a bearer token");
        return Err(AuthError::unauthorized("invalid authorization format"));
    };

    if token.is_empty() {
        warn!("authentication failed: empty bearer token");
        return Err(AuthError::unauthorized("empty bearer token"));
    }

    Ok(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AuthError::unauthorized("request not authenticated"))
    }
}
