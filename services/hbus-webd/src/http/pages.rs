//! `GET /` and `GET /page/{name}/`: the UI-facing HTML surface
//! (spec.md §6). Page bodies are whatever was registered with
//! [`crate::state::AppState::register_page`] at startup; this crate
//! does not ship a templating engine, only the routing contract.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::state::AppState;

pub async fn index(State(state): State<AppState>) -> Response {
    match &state.index_page {
        Some(name) => Redirect::to(&format!("/page/{name}/")).into_response(),
        None => (StatusCode::NOT_FOUND, "no index page configured").into_response(),
    }
}

pub async fn page(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.page(&name).await {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown page '{name}'")).into_response(),
    }
}
