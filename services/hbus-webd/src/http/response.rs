use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hbus_protocol::ApiError;
use std::fmt::Display;

pub(crate) fn json_error(status: StatusCode, message: impl Display) -> Response {
    (status, Json(ApiError::plain(status.as_u16(), message.to_string()))).into_response()
}

pub fn internal_error(err: impl Display) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, err)
}

pub fn decode_error(message: impl Display) -> Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, message)
}

pub fn not_found(message: impl Display) -> Response {
    json_error(StatusCode::NOT_FOUND, message)
}

pub fn conflict(message: impl Display) -> Response {
    json_error(StatusCode::CONFLICT, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn not_found_sets_status_and_error_body() {
        let response = not_found("unknown object 'x'");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.status, 404);
        assert_eq!(parsed.error, "unknown object 'x'");
    }
}
