use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{request::Parts, HeaderMap},
};

use crate::error::ApiError;
use crate::validator::Validator;

/// Query string as decoded by `axum::extract::Query`
pub type QueryParams = HashMap<String, String>;

/// Positive integer id from a path segment; anything else is a 404
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// `:id` path segment as a positive integer. A segment axum cannot decode
/// (e.g. invalid UTF-8) is a 404 like any other malformed id.
#[derive(Debug, Clone, Copy)]
pub struct IdParam(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdParam
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound)?;
        read_id_param(&raw).map(IdParam)
    }
}

pub fn read_string(qs: &QueryParams, key: &str, default: &str) -> String {
    match qs.get(key) {
        Some(s) if !s.is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

/// Comma-separated list; empty entries are dropped
pub fn read_csv(qs: &QueryParams, key: &str, default: Vec<String>) -> Vec<String> {
    match qs.get(key) {
        Some(s) if !s.is_empty() => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => default,
    }
}

/// Integer query value. A non-integer records "must be an integer value"
/// against `key` and yields the default.
pub fn read_int(qs: &QueryParams, key: &str, default: i64, v: &mut Validator) -> i64 {
    match qs.get(key) {
        Some(s) if !s.is_empty() => match s.parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                v.add_error(key, "must be an integer value");
                default
            }
        },
        _ => default,
    }
}

/// Version the client expects to overwrite, from `If-Match` (a plain or
/// quoted integer, optionally weak) or `X-Expected-Version`.
pub fn parse_expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    for name in ["if-match", "x-expected-version"] {
        let Some(value) = headers.get(name) else {
            continue;
        };

        let raw = value
            .to_str()
            .map_err(|_| ApiError::bad_request(format!("invalid {name} header")))?;
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed).trim_matches('"');

        return match trimmed.parse::<i32>() {
            Ok(version) if version >= 1 => Ok(Some(version)),
            _ => Err(ApiError::bad_request(format!(
                "invalid {name} header: expected a record version"
            ))),
        };
    }
    Ok(None)
}
