use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::limiter::Admission;
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

/// Per-client token bucket admission. Installed only when the limiter is
/// enabled; requests pass straight through if state carries no limiter.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.config.limiter.trust_proxy);

    match limiter.check(&key) {
        Admission::Allowed => Ok(next.run(request).await),
        Admission::Rejected { retry_after } => {
            warn!(client = %key, ?retry_after, "rate limit exceeded");
            Err(ApiError::RateLimited { retry_after })
        }
    }
}

/// Identify the client by its socket peer address. Behind a trusted proxy
/// the first hop of `X-Forwarded-For`, then `X-Real-IP`, take precedence.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = || {
        let first_hop = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        first_hop.or(real_ip).map(str::to_string)
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
