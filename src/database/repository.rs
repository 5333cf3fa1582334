use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::memory::InMemoryStore;
use crate::database::models::{Movie, Scope, Token, User};
use crate::database::postgres::{PgMovieRepository, PgTokenRepository, PgUserRepository};
use crate::filter::{Filters, Metadata};

/// Versioned movie records.
///
/// `update` is conditioned on `movie.version` being the version currently
/// stored. When no row matches, the store checks whether the id exists and
/// reports `EditConflict` or `NotFound` accordingly.
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Stores a new movie and stamps `id`, `created_at` and `version` (1)
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError>;

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError>;

    /// Writes `movie` and stamps the new version on success
    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError>;

    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;

    /// Case-insensitive title match and genre containment, sorted and paged
    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Stores a new user; `DuplicateEmail` if the address is taken
    async fn insert(&self, user: &mut User) -> Result<(), DatabaseError>;

    async fn get(&self, id: i64) -> Result<User, DatabaseError>;

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError>;

    async fn update(&self, user: &mut User) -> Result<(), DatabaseError>;

    /// Removes the user together with every token it owns
    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;

    /// Owner of an unexpired token with this plaintext and scope
    async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DatabaseError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError>;

    /// Generate and store a token, returning it with its plaintext
    async fn new_token(
        &self,
        user_id: i64,
        ttl: chrono::Duration,
        scope: Scope,
    ) -> Result<Token, DatabaseError> {
        let token = Token::generate(user_id, ttl, scope);
        TokenRepository::insert(self, &token).await?;
        Ok(token)
    }
}

/// The set of stores handed to request handlers
#[derive(Clone)]
pub struct Models {
    pub movies: Arc<dyn MovieRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenRepository>,
}

impl Models {
    /// PostgreSQL-backed stores; every operation is bounded by `query_timeout`
    pub fn postgres(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            movies: Arc::new(PgMovieRepository::new(pool.clone(), query_timeout)),
            users: Arc::new(PgUserRepository::new(pool.clone(), query_timeout)),
            tokens: Arc::new(PgTokenRepository::new(pool, query_timeout)),
        }
    }

    /// Process-local stores sharing one table set
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            movies: store.clone(),
            users: store.clone(),
            tokens: store,
        }
    }
}
