use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::validator::{matches, Validator};

pub const MAX_NAME_CHARS: usize = 500;
pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Conservative subset of RFC 5322 addr-spec
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Salted argon2 hash plus, transiently, the plaintext it was set from
#[derive(Clone, Default)]
pub struct Password {
    plaintext: Option<String>,
    hash: String,
}

impl Password {
    /// Wrap a hash loaded from storage
    pub fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash,
        }
    }

    /// Hash `plaintext` with a fresh salt
    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();

        self.plaintext = Some(plaintext.to_string());
        self.hash = hash;
        Ok(())
    }

    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let parsed =
            PasswordHash::new(&self.hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password").field("hash", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl User {
    /// Unsaved, not yet activated user without a password
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            name,
            email,
            password: Password::default(),
            activated: false,
            version: 0,
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

/// Checks the user's fields. A user that reaches validation without a
/// password hash is a caller bug, reported through the return value rather
/// than as a field error.
pub fn validate_user(v: &mut Validator, user: &User) -> Result<(), PasswordError> {
    v.check(!user.name.is_empty(), "name", "must be provided");
    v.check(
        user.name.chars().count() <= MAX_NAME_CHARS,
        "name",
        "must not be more than 500 characters long",
    );

    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }

    if user.password.hash().is_empty() {
        return Err(PasswordError::MalformedHash("missing password hash for user".to_string()));
    }
    Ok(())
}
