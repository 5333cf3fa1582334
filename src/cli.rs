use clap::Parser;

use crate::config::{parse_duration, split_origins, AppConfig, ConfigError, Environment};

/// Command-line overrides, applied on top of the environment preset and
/// environment variables
#[derive(Debug, Default, Parser)]
#[command(name = "greenlight")]
#[command(about = "Greenlight - JSON API for a movie catalogue")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "API server port")]
    pub port: Option<u16>,

    #[arg(long = "env", help = "Environment (development|staging|production)")]
    pub environment: Option<Environment>,

    #[arg(long, help = "PostgreSQL DSN")]
    pub db_dsn: Option<String>,

    #[arg(long, help = "PostgreSQL max open connections")]
    pub db_max_open_conns: Option<u32>,

    #[arg(long, help = "PostgreSQL max idle connections")]
    pub db_max_idle_conns: Option<u32>,

    #[arg(long, value_parser = parse_duration, help = "PostgreSQL max connection idle time (e.g. 15m)")]
    pub db_max_idle_time: Option<std::time::Duration>,

    #[arg(long, help = "Enable rate limiter")]
    pub limiter_enabled: Option<bool>,

    #[arg(long, help = "Rate limiter maximum requests per second")]
    pub limiter_rps: Option<f64>,

    #[arg(long, help = "Rate limiter maximum burst")]
    pub limiter_burst: Option<u32>,

    #[arg(long, help = "Key rate limiting on X-Forwarded-For / X-Real-IP (behind a proxy only)")]
    pub limiter_trust_proxy: Option<bool>,

    #[arg(long, help = "Trusted CORS origins (space separated)")]
    pub cors_trusted_origins: Option<String>,
}

impl Cli {
    /// Resolve the full configuration: preset for the chosen environment,
    /// then environment variables, then these flags.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let environment = match self.environment {
            Some(env) => env,
            None => Environment::from_env()?,
        };
        let mut config = AppConfig::for_environment(environment).with_env_overrides();
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dsn) = self.db_dsn {
            config.database.dsn = dsn;
        }
        if let Some(n) = self.db_max_open_conns {
            config.database.max_open_conns = n;
        }
        if let Some(n) = self.db_max_idle_conns {
            config.database.max_idle_conns = n;
        }
        if let Some(d) = self.db_max_idle_time {
            config.database.max_idle_time = d;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.rps = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(trust) = self.limiter_trust_proxy {
            config.limiter.trust_proxy = trust;
        }
        if let Some(origins) = self.cors_trusted_origins {
            config.security.cors_trusted_origins = split_origins(&origins);
        }
    }
}
