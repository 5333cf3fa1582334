use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{conflict_or_missing, is_unique_violation, VersionedTable};
use crate::database::manager::{with_timeout, DatabaseError};
use crate::database::models::token::hash_token;
use crate::database::models::{Password, Scope, User};
use crate::database::repository::UserRepository;

const EMAIL_CONSTRAINT: &str = "users_email_key";
const USER_COLUMNS: &str = "id, created_at, name, email, password_hash, activated, version";

#[derive(FromRow)]
struct UserRow {
    id: i64,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password: Password::from_hash(row.password_hash),
            activated: row.activated,
            version: row.version,
        }
    }
}

fn map_email_conflict(err: sqlx::Error) -> DatabaseError {
    if is_unique_violation(&err, EMAIL_CONSTRAINT) {
        DatabaseError::DuplicateEmail
    } else {
        DatabaseError::Sqlx(err)
    }
}

pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &mut User) -> Result<(), DatabaseError> {
        let (id, created_at, version) = with_timeout(self.timeout, async {
            sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(
                "INSERT INTO users (name, email, password_hash, activated) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, version",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password.hash())
            .bind(user.activated)
            .fetch_one(&self.pool)
            .await
            .map_err(map_email_conflict)
        })
        .await?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<User, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(User::from)
                .ok_or(DatabaseError::NotFound)
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
                .map(User::from)
                .ok_or(DatabaseError::NotFound)
        })
        .await
    }

    async fn update(&self, user: &mut User) -> Result<(), DatabaseError> {
        let new_version = with_timeout(self.timeout, async {
            let updated = sqlx::query_scalar::<_, i32>(
                "UPDATE users \
                 SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1 \
                 WHERE id = $5 AND version = $6 \
                 RETURNING version",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password.hash())
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_email_conflict)?;

            match updated {
                Some(version) => Ok(version),
                None => Err(conflict_or_missing(&self.pool, VersionedTable::Users, user.id).await),
            }
        })
        .await?;

        user.version = new_version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        with_timeout(self.timeout, async {
            // tokens.user_id cascades
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
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

    async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DatabaseError> {
        let hash = hash_token(plaintext);
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                "SELECT users.id, users.created_at, users.name, users.email, \
                        users.password_hash, users.activated, users.version \
                 FROM users \
                 INNER JOIN tokens ON users.id = tokens.user_id \
                 WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3",
            )
            .bind(&hash)
            .bind(scope.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .map(User::from)
            .ok_or(DatabaseError::NotFound)
        })
        .await
    }
}
