use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{conflict_or_missing, escape_like, VersionedTable};
use crate::database::manager::{with_timeout, DatabaseError};
use crate::database::models::Movie;
use crate::database::repository::MovieRepository;
use crate::filter::{FilterOrder, Filters, Metadata};

const MOVIE_COLUMNS: &str = "id, created_at, title, year, runtime, genres, version";

#[derive(FromRow)]
struct MovieListRow {
    total_records: i64,
    #[sqlx(flatten)]
    movie: Movie,
}

pub struct PgMovieRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgMovieRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let (id, created_at, version) = with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(
                "INSERT INTO movies (title, year, runtime, genres) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, DatabaseError>(row)
        })
        .await?;

        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, Movie>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DatabaseError::NotFound)
        })
        .await
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let new_version = with_timeout(self.timeout, async {
            let updated = sqlx::query_scalar::<_, i32>(
                "UPDATE movies \
                 SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1 \
                 WHERE id = $5 AND version = $6 \
                 RETURNING version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .await?;

            match updated {
                Some(version) => Ok(version),
                None => Err(conflict_or_missing(&self.pool, VersionedTable::Movies, movie.id).await),
            }
        })
        .await?;

        movie.version = new_version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        with_timeout(self.timeout, async {
            let result = sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(DatabaseError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        let key = filters
            .sort_key()
            .ok_or_else(|| DatabaseError::Internal(format!("unsafe sort parameter: {}", filters.sort)))?;

        let sql = format!(
            "SELECT count(*) OVER() AS total_records, {MOVIE_COLUMNS} \
             FROM movies \
             WHERE (title ILIKE '%' || $1 || '%' OR $1 = '') \
             AND (genres @> $2 OR $2 = '{{}}') \
             {} \
             LIMIT $3 OFFSET $4",
            FilterOrder::generate(&key)
        );

        let rows = with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, MovieListRow>(&sql)
                .bind(escape_like(title))
                .bind(genres.to_vec())
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(rows)
        })
        .await?;

        let total = rows.first().map(|r| r.total_records).unwrap_or(0);
        let movies = rows.into_iter().map(|r| r.movie).collect();

        Ok((movies, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}
