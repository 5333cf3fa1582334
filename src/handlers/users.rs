// User registration and activation under /v1/users
use axum::extract::State;
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::StrictJson;
use crate::config::Environment;
use crate::database::models::{
    validate_token_plaintext, validate_user, Password, Scope, User,
};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validator::Validator;

/// How long an activation token stays usable
pub const ACTIVATION_TOKEN_TTL_DAYS: i64 = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserInput {
    pub token: String,
}

/// Argon2 hashing runs on the blocking pool
async fn hash_password(plaintext: String) -> Result<Password, ApiError> {
    tokio::task::spawn_blocking(move || {
        let mut password = Password::default();
        password.set(&plaintext).map(|()| password)
    })
    .await
    .map_err(ApiError::server_error)?
    .map_err(ApiError::from)
}

/// POST /v1/users
///
/// Creates an inactive account and issues an activation token. There is no
/// mail delivery; in development the token is written to the debug log.
pub async fn register_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<RegisterUserInput>,
) -> ApiResult {
    let mut user = User::new(input.name, input.email);
    user.password = hash_password(input.password).await?;

    let mut v = Validator::new();
    validate_user(&mut v, &user)?;
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    state.models.users.insert(&mut user).await?;

    let token = state
        .models
        .tokens
        .new_token(
            user.id,
            chrono::Duration::days(ACTIVATION_TOKEN_TTL_DAYS),
            Scope::Activation,
        )
        .await?;

    info!(user_id = user.id, "user registered");
    if state.config.environment == Environment::Development {
        debug!(user_id = user.id, token = %token.plaintext, expiry = %token.expiry, "activation token issued");
    }

    Ok(ApiResponse::accepted().with("user", &user))
}

/// PUT /v1/users/activated
pub async fn activate_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<ActivateUserInput>,
) -> ApiResult {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    let mut user = match state
        .models
        .users
        .get_for_token(Scope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            return Err(ApiError::invalid_field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.models.users.update(&mut user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    info!(user_id = user.id, "user activated");
    Ok(ApiResponse::ok().with("user", &user))
}
