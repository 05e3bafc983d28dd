use axum::{
    extract::{Json, State},
    http::HeaderMap,
    http::Uri,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    clear_cookie, cookie_value, session_cookie, SessionScope, PLATFORM_COOKIE,
};
use crate::errors::ApiError;
use crate::handlers::common::{
    map_service_error, success_response, validate_input, with_cookie,
};
use crate::AppState;

/// Platform (store owner) auth endpoints.
pub fn platform_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(platform_register))
        .route("/login", post(platform_login))
        .route("/logout", post(platform_logout))
}

/// Per-store customer auth endpoints. Every request resolves its tenant
/// first; the session it mints or destroys is scoped to that store.
pub fn customer_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(customer_register))
        .route("/login", post(customer_login))
        .route("/logout", post(customer_logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "is required"))]
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user_id: Uuid,
    email: String,
    first_name: String,
}

async fn platform_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    register_in_scope(&state, payload, SessionScope::Platform).await
}

async fn platform_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    login_in_scope(&state, payload, SessionScope::Platform).await
}

async fn platform_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = cookie_value(&headers, PLATFORM_COOKIE) {
        state
            .services
            .sessions
            .destroy_session(&token, SessionScope::Platform)
            .await
            .map_err(map_service_error)?;
    }
    with_cookie(
        serde_json::json!({ "message": "Logged out" }),
        &clear_cookie(PLATFORM_COOKIE),
    )
}

async fn customer_register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .services
        .tenants
        .resolve(&headers, &uri)
        .await
        .map_err(map_service_error)?;
    register_in_scope(&state, payload, SessionScope::Customer { store_id: store.id }).await
}

async fn customer_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .services
        .tenants
        .resolve(&headers, &uri)
        .await
        .map_err(map_service_error)?;
    login_in_scope(&state, payload, SessionScope::Customer { store_id: store.id }).await
}

async fn customer_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .services
        .tenants
        .resolve(&headers, &uri)
        .await
        .map_err(map_service_error)?;
    let scope = SessionScope::Customer { store_id: store.id };
    let cookie_name = scope.cookie_name();
    if let Some(token) = cookie_value(&headers, &cookie_name) {
        state
            .services
            .sessions
            .destroy_session(&token, scope)
            .await
            .map_err(map_service_error)?;
    }
    with_cookie(
        serde_json::json!({ "message": "Logged out" }),
        &clear_cookie(&cookie_name),
    )
}

/// Registration immediately issues a session, so a new account is logged
/// in without a second round trip.
async fn register_in_scope(
    state: &Arc<AppState>,
    payload: RegisterRequest,
    scope: SessionScope,
) -> Result<axum::response::Response, ApiError> {
    validate_input(&payload)?;

    let sessions = &state.services.sessions;
    let user = sessions
        .register(
            &payload.email,
            &payload.password,
            &payload.first_name,
            payload.last_name.as_deref(),
            scope,
        )
        .await
        .map_err(map_service_error)?;
    let session = sessions
        .create_session(user.id, scope)
        .await
        .map_err(map_service_error)?;

    let cookie = session_cookie(
        &scope.cookie_name(),
        &session.token,
        sessions.session_ttl_secs(),
    );
    with_cookie(
        SessionResponse {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
        },
        &cookie,
    )
}

async fn login_in_scope(
    state: &Arc<AppState>,
    payload: LoginRequest,
    scope: SessionScope,
) -> Result<axum::response::Response, ApiError> {
    validate_input(&payload)?;

    let sessions = &state.services.sessions;
    let (user, session) = sessions
        .login(&payload.email, &payload.password, scope)
        .await
        .map_err(map_service_error)?;

    let cookie = session_cookie(
        &scope.cookie_name(),
        &session.token,
        sessions.session_ttl_secs(),
    );
    with_cookie(
        SessionResponse {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
        },
        &cookie,
    )
}

/// Returns the authenticated platform user, mostly used by dashboards to
/// check login state.
pub async fn current_owner(
    owner: crate::auth::OwnerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(owner.user))
}

/// Returns the authenticated customer and the store their session is
/// scoped to.
pub async fn current_customer(
    customer: crate::auth::CustomerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(serde_json::json!({
        "user": customer.user,
        "store": customer.store,
    })))
}
