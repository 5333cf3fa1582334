use axum::extract::State;

use crate::middleware::ApiResponse;
use crate::state::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(serde::Serialize)]
struct SystemInfo<'a> {
    environment: &'a str,
    version: &'a str,
}

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<AppState>) -> ApiResponse {
    ApiResponse::ok().with("status", "available").with(
        "system_info",
        &SystemInfo {
            environment: state.config.environment.as_str(),
            version: VERSION,
        },
    )
}
