// Movie catalogue endpoints under /v1/movies
use axum::{
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use tracing::info;

use crate::api::StrictJson;
use crate::database::models::movie::SORT_SAFELIST;
use crate::database::models::{validate_movie, Movie};
use crate::error::ApiError;
use crate::filter::{validate_filters, Filters};
use crate::handlers::utils::{
    parse_expected_version, read_csv, read_int, read_string, IdParam, QueryParams,
};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validator::Validator;

/// Body of POST /v1/movies. Absent fields decode to zero values and are
/// reported by validation as "must be provided".
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateMovieInput {
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
}

/// Body of PATCH /v1/movies/:id; only present fields are changed
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateMovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
}

impl UpdateMovieInput {
    fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CreateMovieInput>,
) -> ApiResult {
    let mut movie = Movie::new(input.title, input.year, input.runtime, input.genres);

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    state.models.movies.insert(&mut movie).await?;
    info!(movie_id = movie.id, title = %movie.title, "movie created");

    Ok(ApiResponse::created()
        .with("movie", &movie)
        .with_location(format!("/v1/movies/{}", movie.id)))
}

/// GET /v1/movies/:id
pub async fn show_movie(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult {
    let movie = state.models.movies.get(id).await?;
    Ok(ApiResponse::ok().with("movie", &movie))
}

/// PATCH /v1/movies/:id
///
/// The write is conditioned on the version read here, so a concurrent
/// update between the read and the write surfaces as 409. A client may also
/// pin the version it last saw with `If-Match` / `X-Expected-Version`.
pub async fn update_movie(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    headers: HeaderMap,
    StrictJson(input): StrictJson<UpdateMovieInput>,
) -> ApiResult {
    let expected_version = parse_expected_version(&headers)?;

    let mut movie = state.models.movies.get(id).await?;

    if let Some(expected) = expected_version {
        if expected != movie.version {
            return Err(ApiError::EditConflict);
        }
    }

    input.apply(&mut movie);

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    state.models.movies.update(&mut movie).await?;
    info!(movie_id = movie.id, version = movie.version, "movie updated");

    Ok(ApiResponse::ok().with("movie", &movie))
}

/// DELETE /v1/movies/:id
pub async fn delete_movie(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult {
    state.models.movies.delete(id).await?;
    info!(movie_id = id, "movie deleted");

    Ok(ApiResponse::ok().with("message", "movie successfully deleted"))
}

/// GET /v1/movies?title=&genres=&page=&page_size=&sort=
pub async fn list_movies(
    State(state): State<AppState>,
    Query(qs): Query<QueryParams>,
) -> ApiResult {
    let mut v = Validator::new();

    let title = read_string(&qs, "title", "");
    let genres = read_csv(&qs, "genres", Vec::new());

    let mut filters = Filters::new(SORT_SAFELIST);
    filters.page = read_int(&qs, "page", filters.page, &mut v);
    filters.page_size = read_int(&qs, "page_size", filters.page_size, &mut v);
    filters.sort = read_string(&qs, "sort", &filters.sort);

    validate_filters(&mut v, &filters);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    let (movies, metadata) = state.models.movies.get_all(&title, &genres, &filters).await?;

    Ok(ApiResponse::ok()
        .with("movies", &movies)
        .with("metadata", &metadata))
}
