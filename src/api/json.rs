use axum::{
    async_trait,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::error::ApiError;
use crate::state::AppState;

/// JSON body extractor with client-readable rejections.
///
/// The body is capped at `api.max_request_size_bytes`, must hold exactly one
/// JSON value, and is decoded into `T` (which should set
/// `#[serde(deny_unknown_fields)]`). Every failure is a 400.
#[derive(Debug, Clone)]
pub struct StrictJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<AppState> for StrictJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let limit = state.config.api.max_request_size_bytes;
        let bytes = axum::body::to_bytes(req.into_body(), limit)
            .await
            .map_err(|_| ApiError::bad_request(format!("body must not be larger than {limit} bytes")))?;

        decode_strict(&bytes).map(StrictJson)
    }
}

/// Decode one JSON value from `bytes`, describing failures for the client
pub fn decode_strict<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("body must not be empty"));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut de).map_err(describe)?;

    de.end()
        .map_err(|_| ApiError::bad_request("body must only contain a single JSON value"))?;

    Ok(value)
}

fn describe(err: serde_json::Error) -> ApiError {
    let (line, column) = (err.line(), err.column());
    let message = match err.classify() {
        Category::Syntax => {
            format!("body contains badly-formed JSON (at line {line} column {column})")
        }
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Data => {
            let text = err.to_string();
            if let Some(key) = unknown_field(&text) {
                format!("body contains unknown key \"{key}\"")
            } else if text.starts_with("invalid type") {
                format!("body contains incorrect JSON type (at line {line} column {column})")
            } else {
                format!("body contains invalid value (at line {line} column {column})")
            }
        }
        Category::Io => format!("body could not be read: {err}"),
    };
    ApiError::bad_request(message)
}

/// Field name out of serde's "unknown field `name`, expected ..." message
fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split('`').next()
}
