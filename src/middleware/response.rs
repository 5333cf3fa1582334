use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Success envelope: a JSON object whose top-level keys name the payload,
/// e.g. `{"movie": {...}}` or `{"movies": [...], "metadata": {...}}`.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Map<String, Value>,
    location: Option<String>,
    failed: Option<serde_json::Error>,
}

impl ApiResponse {
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            body: Map::new(),
            location: None,
            failed: None,
        }
    }

    /// 200 OK
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// 201 Created
    pub fn created() -> Self {
        Self::with_status(StatusCode::CREATED)
    }

    /// 202 Accepted
    pub fn accepted() -> Self {
        Self::with_status(StatusCode::ACCEPTED)
    }

    /// Add `data` to the envelope under `key`
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, data: &T) -> Self {
        if self.failed.is_some() {
            return self;
        }
        match serde_json::to_value(data) {
            Ok(value) => {
                self.body.insert(key.to_string(), value);
            }
            Err(e) => self.failed = Some(e),
        }
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        if let Some(e) = self.failed {
            return ApiError::server_error(format!("failed to serialize response: {e}"))
                .into_response();
        }

        let mut response = (self.status, Json(Value::Object(self.body))).into_response();

        if let Some(location) = self.location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                Err(e) => {
                    return ApiError::server_error(format!("invalid location header: {e}"))
                        .into_response();
                }
            }
        }

        response
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

/// Largest plain-text error body carried over into the JSON envelope
const MAX_PLAIN_ERROR_BYTES: usize = 4096;

/// Rewrap error responses produced outside the handlers (the timeout layer,
/// axum's own extractor rejections) as `{"error": message}`.
pub async fn json_error_envelope(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(response.headers()) {
        return response;
    }

    if status == StatusCode::REQUEST_TIMEOUT {
        return ApiError::RequestTimeout.into_response();
    }

    let (mut parts, body) = response.into_parts();
    let text = axum::body::to_bytes(body, MAX_PLAIN_ERROR_BYTES)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_ascii_lowercase()
    } else {
        text
    };

    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, Json(json!({ "error": message }))).into_response()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn envelope_keys_and_location() {
        let response = ApiResponse::created()
            .with("movie", &json!({ "id": 1 }))
            .with_location("/v1/movies/1")
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/v1/movies/1");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "movie": { "id": 1 } }));
    }

    #[test]
    fn unserializable_payload_becomes_server_error() {
        use std::collections::HashMap;

        // non-string map keys cannot become a JSON object
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");

        let response = ApiResponse::ok().with("bad", &bad).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn bare_timeout_becomes_json() {
        let response = StatusCode::REQUEST_TIMEOUT.into_response();
        let response = json_error_envelope(response).await;

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(response).await,
            json!({ "error": crate::error::TIMEOUT_MESSAGE })
        );
    }

    #[tokio::test]
    async fn plain_text_rejection_keeps_status_and_message() {
        let response = (
            StatusCode::BAD_REQUEST,
            [("x-request-id", "abc")],
            "Invalid URL: Invalid UTF-8 in `id`",
        )
            .into_response();
        let response = json_error_envelope(response).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-request-id"], "abc");
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Invalid URL: Invalid UTF-8 in `id`" })
        );
    }

    #[tokio::test]
    async fn json_and_success_responses_pass_through() {
        let response = json_error_envelope(ApiError::NotFound.into_response()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": crate::error::NOT_FOUND_MESSAGE })
        );

        let response = json_error_envelope("hello".into_response()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
