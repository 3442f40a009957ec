//! Session gate for the authenticated routes, plus the operator gate.
//!
//! The session token comes from `Authorization: Bearer` or the
//! `niti_session` cookie. Browsers without a valid session are redirected to
//! the login page; API clients get a 401 naming the login route.
//!
//! Operator routes ignore citizen sessions and check `x-admin-token`
//! against `NITI_ADMIN_TOKEN`. With no token configured they do not exist.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use tracing::{debug, warn};

use niti_core::Error;

use crate::routes::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "niti_session";
pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_HEADER: &str = "x-admin-token";

/// The caller behind a request that passed the gate.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
    pub token: String,
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return deny(req.headers());
    };

    match state.store.session_email(&token) {
        Ok(Some(email)) => {
            req.extensions_mut().insert(CurrentUser { email, token });
            next.run(req).await
        }
        Ok(None) => {
            debug!("Rejected unknown or expired session token");
            // The login is gone, so is the conversation tied to it.
            state.assistant.close(&token);
            deny(req.headers())
        }
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return ApiError(Error::NotFound(req.uri().path().to_string())).into_response();
    };
    let supplied = req
        .headers()
        .get(ADMIN_HEADER)
        .and_then(|value| value.to_str().ok());
    if supplied != Some(expected) {
        warn!("Rejected operator request to {}", req.uri().path());
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Operator token required" })),
        )
            .into_response();
    }
    next.run(req).await
}

fn deny(headers: &HeaderMap) -> Response {
    if accepts_html(headers) {
        Redirect::to(LOGIN_PATH).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication required", "login": LOGIN_PATH })),
        )
            .into_response()
    }
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
