//! HTTP route handlers, mounted under `/api`.

pub mod account;
pub mod chat;
pub mod info;
pub mod profile;
pub mod schemes;
pub mod verify;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{middleware, Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use niti_core::Error;

use crate::auth;
use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .merge(account::routes())
        .merge(profile::routes())
        .merge(schemes::routes())
        .merge(verify::routes())
        .merge(chat::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let operator = Router::new()
        .merge(chat::admin_routes())
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin));

    Router::new()
        .merge(info::routes())
        .merge(account::public_routes())
        .merge(protected)
        .merge(operator)
}

/// Domain error as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            Error::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "Please correct the highlighted fields", "fields": fields }),
            ),
            Error::Scorer(detail) => {
                warn!("Scorer unavailable: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Failed to connect to the server" }),
                )
            }
            Error::Verifier(detail) => {
                warn!("Verifier unavailable: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Verification failed. Please try again." }),
                )
            }
            Error::PostalLookup(detail) => {
                warn!("Postal lookup unavailable: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Could not reach the pincode service" }),
                )
            }
            Error::Chat(detail) | Error::Http(detail) => {
                warn!("Upstream call failed: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Failed to connect to the server" }),
                )
            }
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Not found: {}", what) }),
            ),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Error::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Error::AlreadyExists(what) => (
                StatusCode::CONFLICT,
                json!({ "error": format!("{} is already registered", what) }),
            ),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
