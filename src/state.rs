use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::Models;
use crate::limiter::RateLimiter;

/// Shared, cheaply cloned application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub models: Models,
    /// `None` when rate limiting is disabled
    pub limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Builds the limiter from `config.limiter` when it is enabled
    pub fn new(config: AppConfig, models: Models) -> Self {
        let limiter = config
            .limiter
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.limiter)));

        Self {
            config: Arc::new(config),
            models,
            limiter,
        }
    }
}
