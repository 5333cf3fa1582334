use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::{with_timeout, DatabaseError};
use crate::database::models::{Scope, Token};
use crate::database::repository::TokenRepository;

pub struct PgTokenRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError> {
        with_timeout(self.timeout, async {
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(())
        })
        .await
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError> {
        with_timeout(self.timeout, async {
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(())
        })
        .await
    }
}
