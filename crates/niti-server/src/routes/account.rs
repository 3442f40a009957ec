//! Signup, login and session routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use niti_core::Error;
use niti_intake::form::check_pincode;
use niti_intake::{login as check_login, register, IntakeForm, IntakeStep};

use super::{ApiError, ApiResult};
use crate::auth::{cleared_session_cookie, session_cookie, CurrentUser};
use crate::state::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup/validate", post(validate_step))
        .route("/signup", post(signup))
        .route("/pincode/{code}", get(lookup_pincode))
        .route("/login", post(login))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

// ---------------------------------------------------------------
// Signup
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    step: IntakeStep,
    form: IntakeForm,
}

/// POST /api/signup/validate: check one step, resolving the pincode on
/// the demographics step.
async fn validate_step(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut form = req.form;
    form.step = req.step;
    let next = form.advance(state.postal.as_ref()).await?;
    Ok(Json(json!({ "step": next, "form": form })))
}

/// POST /api/signup: validate every step, register and log in.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(mut form): Json<IntakeForm>,
) -> ApiResult<impl IntoResponse> {
    form.step = IntakeStep::Credentials;
    form.finish(state.postal.as_ref()).await?;

    let profile = register(&state.store, &form)?;
    let session = state.store.create_session(&profile.email, state.session_ttl())?;
    info!("Signup complete for {}", profile.email);

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(session.token.clone())),
        Json(json!({
            "profile": profile,
            "token": session.token,
            "expiresAt": session.expires_at,
        })),
    ))
}

/// GET /api/pincode/{code}: state and city for a pincode.
async fn lookup_pincode(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_pincode(&code).map_err(|e| Error::Validation(vec![e]))?;
    match state.postal.resolve(&code).await? {
        Some(address) => Ok(Json(json!(address))),
        None => Err(ApiError(Error::NotFound(format!("pincode {}", code)))),
    }
}

// ---------------------------------------------------------------
// Session
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = check_login(&state.store, &req.email, &req.password, state.session_ttl())?;
    Ok((
        jar.add(session_cookie(session.token.clone())),
        Json(json!({
            "email": session.email,
            "token": session.token,
            "expiresAt": session.expires_at,
        })),
    ))
}

/// POST /api/logout: end the session and its chat conversation.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    state.store.delete_session(&user.token)?;
    state.assistant.close(&user.token);
    info!("Logged out {}", user.email);
    Ok((
        jar.remove(cleared_session_cookie()),
        Json(json!({ "success": true })),
    ))
}

/// GET /api/me
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let profile = state.store.get_profile(&user.email)?;
    Ok(Json(json!({ "email": user.email, "profile": profile })))
}
