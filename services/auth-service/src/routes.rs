//! HTTP surface: auth endpoints and the protected identity route.
//!
//! Handlers stay thin; they validate the request shape, delegate to the
//! session lifecycle service, and map its results onto status codes.

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::auth::{bearer_token, require_auth, AuthUser};
use crate::services::TokenPair;
use crate::store::{User, UserStatus};
use crate::AppState;

/// Registration request body.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username.
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    /// Email address.
    #[validate(email)]
    pub email: String,
    /// Plaintext password.
    #[validate(length(min = 8))]
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address.
    #[validate(email)]
    pub email: String,
    /// Plaintext password.
    #[validate(length(min = 1))]
    pub password: String,
}

/// Refresh request body.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    /// The refresh token to rotate.
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Identity response for the protected `/me` route.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// User id.
    pub id: String,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Account status.
    pub status: UserStatus,
    /// Last successful login, if any.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            status: user.status,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Build the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/me", get(me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPair>), AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    let pair = state
        .auth
        .register(&req.username, &req.email, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    let pair = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(pair))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    let pair = state.auth.refresh_token(&req.refresh_token).await?;
    Ok(Json(pair))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = bearer_token(&headers)?;
    state.auth.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse::from(user))
}
