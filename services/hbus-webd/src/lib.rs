pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod web_api_object;

pub use state::AppState;

use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::pages::index))
        .route("/page/:name/", get(http::pages::page))
        .route("/ws", get(http::ui_ws::ui_ws_handler))
        .route("/api/v1/object/:name", get(http::object::get_object).post(http::object::post_object))
        .route("/api/v1/ws", get(http::api_ws::api_ws_handler))
        .route("/api/v1/admin/interfaces", get(http::admin::list_interfaces))
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (axum::http::StatusCode::NOT_FOUND, Html("<!DOCTYPE html><html><body><h1>404</h1></body></html>"))
}
