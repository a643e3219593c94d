//! Axum routes for the shop API.

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{session, state::AppState};

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod users;

/// Prefix of every API route except `/health`.
pub const API_PREFIX: &str = "/api/v1";

/// `{"detail": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: &'static str,
}

/// Distinguishes an explicit `null` from an absent field:
/// absent → `None`, `null` → `Some(None)`. Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let scoped = Router::new()
        .merge(cart::router())
        .merge(orders::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), session::ensure_session));

    let api = Router::new()
        .merge(catalog::router())
        .merge(users::router())
        .merge(scoped)
        .layer(middleware::from_fn_with_state(state.clone(), session::authenticate));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// `GET /health`: liveness check.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
