//! Profile edit and photo routes.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Extension, Json, Router};
use serde_json::json;

use niti_core::{Error, UserProfile};
use niti_intake::{update_profile, upload_photo, ProfileEdit};

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", put(edit_profile))
        .route(
            "/profile/photo",
            post(upload).get(download).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
}

/// PUT /api/profile: age, income and pincode.
async fn edit_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(edit): Json<ProfileEdit>,
) -> ApiResult<Json<UserProfile>> {
    let profile = update_profile(&state.store, state.postal.as_ref(), &user.email, &edit).await?;
    Ok(Json(profile))
}

/// POST /api/profile/photo: multipart field `photo`.
async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::field("photo", format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let filename = field.file_name().unwrap_or("photo").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::field("photo", format!("Invalid upload: {}", e)))?;

        let key = upload_photo(&state.store, &state.photos, &user.email, &filename, &bytes)?;
        return Ok(Json(json!({ "profilePhoto": key })));
    }
    Err(Error::field("photo", "Choose an image to upload").into())
}

/// GET /api/profile/photo
async fn download(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let not_found = || Error::NotFound("profile photo".into());
    let key = state
        .store
        .get_profile(&user.email)?
        .and_then(|p| p.profile_photo)
        .ok_or_else(not_found)?;
    let bytes = state.photos.get(&key)?.ok_or_else(not_found)?;
    Ok(([(header::CONTENT_TYPE, content_type(&key))], bytes))
}

fn content_type(key: &str) -> &'static str {
    match key.rsplit('.').next().unwrap_or("") {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
