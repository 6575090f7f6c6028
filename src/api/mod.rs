//! HTTP API module - image sharing REST endpoints

mod cors;
mod error;
mod images;

use std::any::Any;
use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::images::ImageRepository;
pub use cors::AllowedOrigins;
use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ImageRepository>,
}

/// Build the API router
///
/// Routes are served both unprefixed and under `/api`.
pub fn router(store: Arc<dyn ImageRepository>, origins: AllowedOrigins) -> Router {
    let state = AppState { store };

    let routes = Router::new()
        .route("/health", get(health_check))
        .merge(images::router());

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(origins.cors_layer())
        .layer(middleware::from_fn_with_state(origins, cors::enforce_origin))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "OK" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> axum::response::Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Error: {}", detail);
    ApiError::Internal.into_response()
}
