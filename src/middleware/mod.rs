pub mod rate_limit;
pub mod response;

pub use rate_limit::{client_key, rate_limit_middleware};
pub use response::{json_error_envelope, ApiResponse, ApiResult};
