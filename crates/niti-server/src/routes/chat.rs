//! Assistant routes: per-session conversation, plus the operator-only
//! provider configuration.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde_json::json;

use niti_chat::{ChatReply, ChatRequest, LLMConfigResponse, LLMConfigUpdate};

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/session", delete(end_session))
        .route("/chat/catalog/refresh", post(refresh_catalog))
}

/// Mounted behind the operator gate, never the session gate.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/chat/config", get(get_config).put(update_config))
}

// ---------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------

/// POST /api/chat: one turn in the caller's conversation. Provider
/// failures come back as the fallback reply, not as an error status.
async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let store = state.store.clone();
    let reply = state
        .assistant
        .send(&user.token, &req.message, move || store.get_all_schemes())
        .await?;
    Ok(Json(reply))
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<serde_json::Value> {
    let closed = state.assistant.close(&user.token);
    Json(json!({ "closed": closed }))
}

/// POST /api/chat/catalog/refresh: new conversations re-read the catalog.
async fn refresh_catalog(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.assistant.refresh_catalog();
    Json(json!({ "success": true }))
}

// ---------------------------------------------------------------
// Config
// ---------------------------------------------------------------

async fn get_config(State(state): State<Arc<AppState>>) -> Json<LLMConfigResponse> {
    let config = state.llm_config.read();
    Json(config.to_response())
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> ApiResult<Json<LLMConfigResponse>> {
    let mut config = state.llm_config.write();
    config.apply_update(&update)?;
    config.save()?;
    Ok(Json(config.to_response()))
}
