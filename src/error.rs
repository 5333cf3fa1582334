// HTTP API error types
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::user::PasswordError;
use crate::database::DatabaseError;
use crate::validator::ValidationErrors;

pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";
pub const RATE_LIMITED_MESSAGE: &str = "rate limit exceeded";
pub const TIMEOUT_MESSAGE: &str = "the server took too long to process your request";
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Every failure a handler can report to the client
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request (malformed body, bad header, bad query value)
    BadRequest(String),

    // 404 Not Found
    NotFound,

    // 405 Method Not Allowed
    MethodNotAllowed(Method),

    // 408 Request Timeout
    RequestTimeout,

    // 409 Conflict
    EditConflict,

    // 422 Unprocessable Entity
    FailedValidation(ValidationErrors),

    // 429 Too Many Requests
    RateLimited { retry_after: Duration },

    // 500 Internal Server Error; the detail is logged, never sent
    ServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::NotFound => NOT_FOUND_MESSAGE.to_string(),
            ApiError::MethodNotAllowed(method) => {
                format!("the {method} method is not supported for this resource")
            }
            ApiError::RequestTimeout => TIMEOUT_MESSAGE.to_string(),
            ApiError::EditConflict => EDIT_CONFLICT_MESSAGE.to_string(),
            ApiError::FailedValidation(_) => "failed validation".to_string(),
            ApiError::RateLimited { .. } => RATE_LIMITED_MESSAGE.to_string(),
            ApiError::ServerError(_) => SERVER_ERROR_MESSAGE.to_string(),
        }
    }

    /// `{"error": message}`, or `{"error": {field: message}}` for validation
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::FailedValidation(errors) => json!({ "error": errors }),
            _ => json!({ "error": self.message() }),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn failed_validation(errors: ValidationErrors) -> Self {
        ApiError::FailedValidation(errors)
    }

    pub fn server_error(detail: impl std::fmt::Display) -> Self {
        ApiError::ServerError(detail.to_string())
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.insert(field.to_string(), message.to_string());
        ApiError::FailedValidation(errors)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => ApiError::NotFound,
            DatabaseError::EditConflict => ApiError::EditConflict,
            DatabaseError::DuplicateEmail => {
                ApiError::invalid_field("email", "a user with this email address already exists")
            }
            other => ApiError::server_error(other),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::server_error(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::ServerError(detail) => write!(f, "{}: {}", self.message(), detail),
            _ => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ApiError::ServerError(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }

        let mut response = (status, Json(self.to_json())).into_response();

        if let ApiError::RateLimited { retry_after } = &self {
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
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
    async fn not_found_envelope() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": NOT_FOUND_MESSAGE }));
    }

    #[tokio::test]
    async fn validation_errors_are_keyed_by_field() {
        let response = ApiError::invalid_field("title", "must be provided").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(response).await,
            json!({ "error": { "title": "must be provided" } })
        );
    }

    #[tokio::test]
    async fn server_error_hides_detail() {
        let response = ApiError::server_error("connection reset by peer").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": SERVER_ERROR_MESSAGE }));
    }

    #[tokio::test]
    async fn method_not_allowed_names_the_method() {
        let response = ApiError::MethodNotAllowed(Method::PUT).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "the PUT method is not supported for this resource" })
        );
    }

    #[test]
    fn rate_limited_sets_retry_after_in_whole_seconds() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn database_errors_map_by_kind() {
        assert!(matches!(ApiError::from(DatabaseError::NotFound), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(DatabaseError::EditConflict),
            ApiError::EditConflict
        ));
        assert!(matches!(
            ApiError::from(DatabaseError::DuplicateEmail),
            ApiError::FailedValidation(ref e) if e.contains_key("email")
        ));
        assert!(matches!(
            ApiError::from(DatabaseError::Timeout(Duration::from_secs(3))),
            ApiError::ServerError(_)
        ));
    }
}
