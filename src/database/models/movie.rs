use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::validator::{unique, Validator};

pub const MIN_YEAR: i32 = 1888;
pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_GENRES: usize = 5;

/// Columns a movie listing may be sorted by (`-` prefix for descending)
pub const SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub version: i32,
}

impl Movie {
    /// Unsaved movie; the store assigns id, created_at and version
    pub fn new(title: String, year: i32, runtime: i32, genres: Vec<String>) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title,
            year,
            runtime,
            genres,
            version: 0,
        }
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    validate_movie_as_of(v, movie, Utc::now().year());
}

/// `current_year` is injected so the upper bound on `year` is testable
pub fn validate_movie_as_of(v: &mut Validator, movie: &Movie, current_year: i32) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.chars().count() <= MAX_TITLE_CHARS,
        "title",
        "must not be more than 500 characters long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= MIN_YEAR, "year", "must be greater than or equal to 1888");
    v.check(
        movie.year <= current_year + 1,
        "year",
        "must not be more than one year in the future",
    );

    v.check(movie.runtime != 0, "runtime", "must be provided");
    v.check(movie.runtime > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(unique(&movie.genres), "genres", "must not contain duplicate values");
    v.check(
        movie.genres.iter().all(|g| !g.trim().is_empty()),
        "genres",
        "must not contain empty values",
    );
    v.check(
        movie.genres.iter().all(|g| *g == g.to_lowercase()),
        "genres",
        "must only contain lowercase values",
    );
}
