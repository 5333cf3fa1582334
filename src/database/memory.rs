use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::database::manager::DatabaseError;
use crate::database::models::token::hash_token;
use crate::database::models::{Movie, Scope, Token, User};
use crate::database::repository::{MovieRepository, TokenRepository, UserRepository};
use crate::filter::{Filters, Metadata, SortDirection};

#[derive(Default)]
struct Tables {
    last_movie_id: i64,
    movies: BTreeMap<i64, Movie>,
    last_user_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, Token>,
}

/// In-process store with the same observable behaviour as the PostgreSQL
/// one: serial ids, version stamping, conditional updates, unique emails and
/// cascading token removal.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn email_taken(tables: &Tables, email: &str, except_id: i64) -> bool {
    tables
        .users
        .values()
        .any(|u| u.id != except_id && u.email.eq_ignore_ascii_case(email))
}

fn compare_movies(a: &Movie, b: &Movie, column: &str) -> Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "runtime" => a.runtime.cmp(&b.runtime),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl MovieRepository for InMemoryStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        tables.last_movie_id += 1;

        movie.id = tables.last_movie_id;
        movie.created_at = Utc::now();
        movie.version = 1;
        tables.movies.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }
        self.tables()
            .movies
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        let stored = tables.movies.get_mut(&movie.id).ok_or(DatabaseError::NotFound)?;
        if stored.version != movie.version {
            return Err(DatabaseError::EditConflict);
        }

        stored.title = movie.title.clone();
        stored.year = movie.year;
        stored.runtime = movie.runtime;
        stored.genres = movie.genres.clone();
        stored.version += 1;

        movie.version = stored.version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }
        self.tables()
            .movies
            .remove(&id)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound)
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

        let needle = title.to_lowercase();
        let mut rows: Vec<Movie> = self
            .tables()
            .movies
            .values()
            .filter(|m| needle.is_empty() || m.title.to_lowercase().contains(&needle))
            .filter(|m| genres.iter().all(|g| m.genres.contains(g)))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = compare_movies(a, b, &key.column);
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        let total = rows.len() as i64;
        let page: Vec<Movie> = rows
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &mut User) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        if email_taken(&tables, &user.email, 0) {
            return Err(DatabaseError::DuplicateEmail);
        }
        tables.last_user_id += 1;

        user.id = tables.last_user_id;
        user.created_at = Utc::now();
        user.version = 1;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<User, DatabaseError> {
        self.tables()
            .users
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        self.tables()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        let current = tables.users.get(&user.id).ok_or(DatabaseError::NotFound)?.version;
        if current != user.version {
            return Err(DatabaseError::EditConflict);
        }
        if email_taken(&tables, &user.email, user.id) {
            return Err(DatabaseError::DuplicateEmail);
        }

        user.version = current + 1;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        tables.users.remove(&id).ok_or(DatabaseError::NotFound)?;
        tables.tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }

    async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DatabaseError> {
        let hash = hash_token(plaintext);
        let tables = self.tables();

        let token = tables
            .tokens
            .get(&hash)
            .filter(|t| t.scope == scope && !t.is_expired_at(Utc::now()))
            .ok_or(DatabaseError::NotFound)?;

        tables
            .users
            .get(&token.user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&token.user_id) {
            return Err(DatabaseError::Internal(format!(
                "token references missing user {}",
                token.user_id
            )));
        }

        let stored = Token {
            plaintext: String::new(),
            ..token.clone()
        };
        tables.tokens.insert(stored.hash.clone(), stored);
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError> {
        self.tables()
            .tokens
            .retain(|_, t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}
