//! `GET`/`POST /api/v1/object/{name}`: the long-poll JSON object API
//! described in spec.md §4.F and §6.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hbus_core::{ConversionRegistry, Origin, Writable};
use serde::Deserialize;

use crate::http::response::{conflict, decode_error, internal_error, not_found};
use crate::state::AppState;
use crate::web_api_object::{LongPollOutcome, NextValue};

const ETAG_HEADER: &str = "etag";
const IF_NONE_MATCH_HEADER: &str = "if-none-match";
const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

#[derive(Debug, Deserialize)]
pub struct GetObjectParams {
    #[serde(default)]
    wait: bool,
    timeout: Option<f64>,
}

fn parse_if_none_match(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(IF_NONE_MATCH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"'))
        .and_then(|s| s.parse::<u64>().ok())
}

fn etag_header_value(etag: u64) -> (&'static str, String) {
    (ETAG_HEADER, format!("\"{etag}\""))
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<GetObjectParams>,
    headers: HeaderMap,
) -> Response {
    let Some(object) = state.object_by_name(&name).await else {
        return not_found(format!("unknown object '{name}'"));
    };

    let if_none_match = parse_if_none_match(&headers);
    let timeout = Duration::from_secs_f64(params.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).max(0.0));

    match object.long_poll(if_none_match, params.wait, timeout).await {
        LongPollOutcome::NotChanged { etag } => {
            (StatusCode::NOT_MODIFIED, [etag_header_value(etag)]).into_response()
        }
        LongPollOutcome::Value(NextValue { etag, value: None }) => {
            let mut resp = conflict(format!("object '{name}' has no value yet"));
            resp.headers_mut().insert(ETAG_HEADER, etag.to_string().parse().expect("digits are valid header bytes"));
            resp
        }
        LongPollOutcome::Value(NextValue { etag, value: Some(value) }) => {
            let body = ConversionRegistry::to_json(&value);
            (StatusCode::OK, [etag_header_value(etag)], Json(body)).into_response()
        }
    }
}

pub async fn post_object(State(state): State<AppState>, Path(name): Path<String>, body: axum::body::Bytes) -> Response {
    let Some(object) = state.object_by_name(&name).await else {
        return not_found(format!("unknown object '{name}'"));
    };

    let json: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return decode_error(format!("invalid JSON body: {err}")),
    };
    let value = match ConversionRegistry::from_json(object.kind(), json) {
        Ok(v) => v,
        Err(err) => return decode_error(err.to_string()),
    };

    match object.write(value, Origin::root()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => internal_error(err),
    }
}
