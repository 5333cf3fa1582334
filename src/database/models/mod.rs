pub mod movie;
pub mod token;
pub mod user;

pub use movie::{validate_movie, Movie};
pub use token::{validate_token_plaintext, Scope, Token};
pub use user::{validate_email, validate_password_plaintext, validate_user, Password, User};
