//! Identity card verification route.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde_json::json;

use niti_core::Error;
use niti_verify::{verify, VerifyOutcome, MISSING_IMAGES};

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/verify",
        post(verify_identity).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
    )
}

/// POST /api/verify: multipart `front_image` and `back_image`.
///
/// A rejection is a normal answer (`verified: false` with a message); only
/// a missing image, an unknown profile or an unreachable verifier are errors.
async fn verify_identity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut front = Vec::new();
    let mut back = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Error::field("images", MISSING_IMAGES))?
    {
        let slot = match field.name() {
            Some("front_image") => &mut front,
            Some("back_image") => &mut back,
            _ => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|_| Error::field("images", MISSING_IMAGES))?;
        *slot = bytes.to_vec();
    }

    match verify(&state.store, state.verifier.as_ref(), &user.email, &front, &back).await? {
        VerifyOutcome::Verified => Ok(Json(json!({ "verified": true }))),
        VerifyOutcome::Rejected(message) => {
            Ok(Json(json!({ "verified": false, "error": message })))
        }
    }
}
