use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::api::auth::{check_password, expired_session_cookie, session_cookie};
use crate::api::{AdminSession, ApiContext, ApiError, Result};

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    password: String,
}

#[derive(Serialize, Debug)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize, Debug)]
struct SessionResponse {
    authenticated: bool,
}

/// Checks the admin password and opens a session. Returns the new token, or
/// `None` when the password does not match.
pub(crate) fn open_session(ctx: &ApiContext, password: &str) -> Option<String> {
    if ctx.cfg.admin_password.is_empty() || !check_password(password, &ctx.cfg.admin_password) {
        warn!("rejected admin login");
        return None;
    }
    info!("admin logged in");
    Some(ctx.sessions.create())
}

async fn login(
    State(ctx): State<ApiContext>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let token = open_session(&ctx, &req.password).ok_or(ApiError::Unauthorized)?;
    let cookie = session_cookie(&token, ctx.sessions.ttl());
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(LoginResponse { token })))
}

async fn logout(
    State(ctx): State<ApiContext>,
    admin: Option<AdminSession>,
) -> impl IntoResponse {
    if let Some(admin) = admin {
        ctx.sessions.revoke(&admin.token);
    }
    (StatusCode::NO_CONTENT, AppendHeaders([(SET_COOKIE, expired_session_cookie())]))
}

async fn session(_admin: AdminSession) -> Json<SessionResponse> {
    Json(SessionResponse { authenticated: true })
}
