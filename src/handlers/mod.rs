// Request handlers, one module per resource
pub mod healthcheck;
pub mod movies;
pub mod users;
pub mod utils;

pub use healthcheck::healthcheck;
pub use movies::{create_movie, delete_movie, list_movies, show_movie, update_movie};
pub use users::{activate_user, register_user};
