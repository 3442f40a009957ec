//! Unauthenticated routes: health and interface strings.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use niti_core::Error;

use super::ApiResult;
use crate::i18n;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/i18n/{lang}", get(strings))
        .route("/i18n/{lang}/{key}", get(translate))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "scorer": state.matcher.scorer_name(),
        "languages": i18n::LANGUAGES,
    }))
}

/// GET /api/i18n/{lang}: the whole table for one language.
async fn strings(Path(lang): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let table = i18n::table(&lang).ok_or_else(|| Error::NotFound(format!("language {}", lang)))?;
    Ok(Json(json!({ "lang": lang, "strings": table })))
}

/// GET /api/i18n/{lang}/{key}: falls back to the key itself.
async fn translate(Path((lang, key)): Path<(String, String)>) -> Json<serde_json::Value> {
    let text = i18n::translate(&lang, &key).to_string();
    Json(json!({ "key": key, "text": text }))
}
