//! Eligibility routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use niti_core::{Error, Scheme};
use niti_match::MatchOutcome;

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schemes/find", post(find_schemes))
        .route("/schemes/eligible", get(eligible_schemes))
        .route("/schemes/{id}", get(get_scheme))
}

/// POST /api/schemes/find: rescore the caller and replace their list.
async fn find_schemes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<MatchOutcome>> {
    let outcome = state.matcher.find_schemes(&user.email).await?;
    Ok(Json(outcome))
}

/// GET /api/schemes/eligible: the stored list, without rescoring.
async fn eligible_schemes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<MatchOutcome>> {
    Ok(Json(state.matcher.current_schemes(&user.email)?))
}

async fn get_scheme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Scheme>> {
    let scheme = state
        .store
        .get_scheme(&id)?
        .ok_or_else(|| Error::NotFound(format!("scheme {}", id)))?;
    Ok(Json(scheme))
}
