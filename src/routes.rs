use std::any::Any;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{json_error_envelope, rate_limit_middleware};
use crate::state::AppState;

/// The full HTTP surface with its middleware stack
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(healthcheck_routes())
        .merge(movie_routes())
        .merge(user_routes())
        .fallback(not_found);

    if state.limiter.is_some() {
        router = router.layer(from_fn_with_state(state.clone(), rate_limit_middleware));
    }

    router
        .layer(TimeoutLayer::new(state.config.api.request_timeout))
        .layer(map_response(json_error_envelope))
        .layer(cors_layer(&state.config.security.cors_trusted_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn healthcheck_routes() -> Router<AppState> {
    Router::new().route(
        "/v1/healthcheck",
        get(handlers::healthcheck).fallback(method_not_allowed),
    )
}

fn movie_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/movies",
            get(handlers::list_movies)
                .post(handlers::create_movie)
                .fallback(method_not_allowed),
        )
        .route(
            "/v1/movies/:id",
            get(handlers::show_movie)
                .patch(handlers::update_movie)
                .delete(handlers::delete_movie)
                .fallback(method_not_allowed),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/users",
            post(handlers::register_user).fallback(method_not_allowed),
        )
        .route(
            "/v1/users/activated",
            put(handlers::activate_user).fallback(method_not_allowed),
        )
}

/// CORS for the configured origins only; with none configured no CORS
/// headers are added and browsers fall back to same-origin.
fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::IF_MATCH])
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::server_error(format!("handler panicked: {detail}")).into_response()
}
