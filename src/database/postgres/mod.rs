mod movies;
mod tokens;
mod users;

pub use movies::PgMovieRepository;
pub use tokens::PgTokenRepository;
pub use users::PgUserRepository;

use sqlx::PgPool;

use crate::database::manager::DatabaseError;

/// Tables whose rows carry an optimistic-concurrency `version`
#[derive(Debug, Clone, Copy)]
pub(crate) enum VersionedTable {
    Movies,
    Users,
}

impl VersionedTable {
    fn exists_sql(&self) -> &'static str {
        match self {
            VersionedTable::Movies => "SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)",
            VersionedTable::Users => "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
        }
    }
}

/// Explain a conditional update that touched no rows.
///
/// The follow-up read is not atomic with the failed update: a row deleted in
/// between is reported as `NotFound` rather than `EditConflict`.
pub(crate) async fn conflict_or_missing(
    pool: &PgPool,
    table: VersionedTable,
    id: i64,
) -> DatabaseError {
    match sqlx::query_scalar::<_, bool>(table.exists_sql())
        .bind(id)
        .fetch_one(pool)
        .await
    {
        Ok(exists) => classify_missed_update(exists),
        Err(e) => DatabaseError::Sqlx(e),
    }
}

pub(crate) fn classify_missed_update(row_exists: bool) -> DatabaseError {
    if row_exists {
        DatabaseError::EditConflict
    } else {
        DatabaseError::NotFound
    }
}

/// Escape LIKE metacharacters so user input matches literally
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missed_update_classification() {
        assert!(matches!(classify_missed_update(true), DatabaseError::EditConflict));
        assert!(matches!(classify_missed_update(false), DatabaseError::NotFound));
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("casa"), "casa");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, "users_email_key"));
    }
}
