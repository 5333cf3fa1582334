//! Repository behaviour against a live PostgreSQL database. Each test gets a
//! fresh database with the migrations applied; run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::time::Duration;

use anyhow::Result;
use greenlight::database::models::movie::SORT_SAFELIST;
use greenlight::database::models::{Movie, Password, Scope, User};
use greenlight::database::{DatabaseError, Models};
use greenlight::filter::{Filters, Metadata};
use sqlx::PgPool;

fn models(pool: PgPool) -> Models {
    Models::postgres(pool, Duration::from_secs(5))
}

fn movie(title: &str, year: i32, runtime: i32, genres: &[&str]) -> Movie {
    Movie::new(
        title.to_string(),
        year,
        runtime,
        genres.iter().map(|g| g.to_string()).collect(),
    )
}

async fn seed(models: &Models) -> Result<()> {
    for mut m in [
        movie("The Godfather", 1972, 175, &["crime", "drama"]),
        movie("Casablanca", 1942, 102, &["drama", "romance", "war"]),
        movie("The Godfather Part II", 1974, 202, &["crime", "drama"]),
        movie("Moana", 2016, 107, &["animation", "adventure"]),
        movie("100% Wolf", 2020, 96, &["animation", "comedy"]),
    ] {
        models.movies.insert(&mut m).await?;
    }
    Ok(())
}

fn titles(movies: &[Movie]) -> Vec<&str> {
    movies.iter().map(|m| m.title.as_str()).collect()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_bumps_version_and_detects_conflicts(pool: PgPool) -> Result<()> {
    let models = models(pool);
    let mut m = movie("Casablanca", 1942, 102, &["drama"]);
    models.movies.insert(&mut m).await?;
    assert_eq!(m.version, 1);

    let mut first = models.movies.get(m.id).await?;
    let mut second = first.clone();

    first.runtime = 103;
    models.movies.update(&mut first).await?;
    assert_eq!(first.version, 2);
    assert_eq!(models.movies.get(m.id).await?.runtime, 103);

    // still holds version 1
    second.runtime = 104;
    assert!(matches!(
        models.movies.update(&mut second).await,
        Err(DatabaseError::EditConflict)
    ));
    assert_eq!(second.version, 1);
    assert_eq!(models.movies.get(m.id).await?.version, 2);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_and_delete_of_missing_rows_are_not_found(pool: PgPool) -> Result<()> {
    let models = models(pool);

    let mut ghost = movie("Ghost", 1990, 127, &["drama"]);
    ghost.id = 999;
    ghost.version = 3;
    assert!(matches!(
        models.movies.update(&mut ghost).await,
        Err(DatabaseError::NotFound)
    ));
    assert!(matches!(models.movies.delete(999).await, Err(DatabaseError::NotFound)));
    assert!(matches!(models.movies.get(999).await, Err(DatabaseError::NotFound)));

    let mut m = movie("Up", 2009, 96, &["animation"]);
    models.movies.insert(&mut m).await?;
    models.movies.delete(m.id).await?;
    assert!(matches!(models.movies.update(&mut m).await, Err(DatabaseError::NotFound)));
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn listing_filters_sorts_and_pages(pool: PgPool) -> Result<()> {
    let models = models(pool);
    seed(&models).await?;
    let filters = Filters::new(SORT_SAFELIST);

    let (rows, meta) = models.movies.get_all("godFATHER", &[], &filters).await?;
    assert_eq!(titles(&rows), vec!["The Godfather", "The Godfather Part II"]);
    assert_eq!(meta.total_records, 2);

    // wildcards in the title match literally
    let (rows, _) = models.movies.get_all("100%", &[], &filters).await?;
    assert_eq!(titles(&rows), vec!["100% Wolf"]);
    let (rows, _) = models.movies.get_all("%", &[], &filters).await?;
    assert_eq!(titles(&rows), vec!["100% Wolf"]);

    let genres = vec!["drama".to_string(), "war".to_string()];
    let (rows, _) = models.movies.get_all("", &genres, &filters).await?;
    assert_eq!(titles(&rows), vec!["Casablanca"]);

    let mut paged = Filters::new(SORT_SAFELIST);
    paged.sort = "-runtime".to_string();
    paged.page = 2;
    paged.page_size = 2;
    let (rows, meta) = models.movies.get_all("", &[], &paged).await?;
    assert_eq!(titles(&rows), vec!["Moana", "Casablanca"]);
    assert_eq!(
        meta,
        Metadata {
            current_page: 2,
            page_size: 2,
            first_page: 1,
            last_page: 3,
            total_records: 5,
        }
    );

    let (rows, meta) = models.movies.get_all("nothing", &[], &filters).await?;
    assert!(rows.is_empty());
    assert_eq!(meta, Metadata::default());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn users_are_versioned_and_tokens_resolve_owner(pool: PgPool) -> Result<()> {
    let models = models(pool);

    let mut user = User::new("Alice".to_string(), "alice@example.com".to_string());
    user.password = Password::from_hash("$argon2id$v=19$stub".to_string());
    models.users.insert(&mut user).await?;

    let mut twin = User::new("Alice".to_string(), "ALICE@example.com".to_string());
    twin.password = user.password.clone();
    assert!(matches!(
        models.users.insert(&mut twin).await,
        Err(DatabaseError::DuplicateEmail)
    ));

    let token = models
        .tokens
        .new_token(user.id, chrono::Duration::days(3), Scope::Activation)
        .await?;
    let mut owner = models.users.get_for_token(Scope::Activation, &token.plaintext).await?;
    assert_eq!(owner.id, user.id);

    let mut stale = owner.clone();
    owner.activated = true;
    models.users.update(&mut owner).await?;
    assert_eq!(owner.version, user.version + 1);
    assert!(matches!(
        models.users.update(&mut stale).await,
        Err(DatabaseError::EditConflict)
    ));

    models.tokens.delete_all_for_user(Scope::Activation, user.id).await?;
    assert!(matches!(
        models.users.get_for_token(Scope::Activation, &token.plaintext).await,
        Err(DatabaseError::NotFound)
    ));
    Ok(())
}
