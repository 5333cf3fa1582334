pub mod json;

pub use json::{decode_strict, StrictJson};
