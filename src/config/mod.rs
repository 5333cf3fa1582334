use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid environment '{0}' (expected development|staging|production)")]
    InvalidEnvironment(String),

    #[error("invalid duration '{0}' (expected e.g. 90s, 15m, 1h)")]
    InvalidDuration(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database: DatabaseConfig,
    pub limiter: LimiterConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub max_idle_time: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for every individual store operation
    pub query_timeout: Duration,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Tokens replenished per second
    pub rps: f64,
    /// Bucket capacity
    pub burst: u32,
    pub sweep_interval: Duration,
    /// Buckets not seen for this long are evicted by the sweep
    pub idle_timeout: Duration,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address; only safe behind a proxy that overwrites those headers
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub max_request_size_bytes: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub cors_trusted_origins: Vec<String>,
}

impl Environment {
    /// Reads ENVIRONMENT (falling back to APP_ENV), defaulting to development
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("ENVIRONMENT").or_else(|_| env::var("APP_ENV")) {
            Ok(v) if !v.is_empty() => v.parse(),
            _ => Ok(Environment::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Structured JSON logs outside development
    pub fn json_logs(&self) -> bool {
        !matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

impl AppConfig {
    /// Environment preset with env var overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::for_environment(Environment::from_env()?).with_env_overrides())
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.port = v.parse().unwrap_or(self.port);
        }

        // Database overrides
        if let Ok(v) = env::var("GREENLIGHT_DB_DSN").or_else(|_| env::var("DATABASE_URL")) {
            self.database.dsn = v;
        }
        if let Ok(v) = env::var("DB_MAX_OPEN_CONNS") {
            self.database.max_open_conns = v.parse().unwrap_or(self.database.max_open_conns);
        }
        if let Ok(v) = env::var("DB_MAX_IDLE_CONNS") {
            self.database.max_idle_conns = v.parse().unwrap_or(self.database.max_idle_conns);
        }
        if let Ok(v) = env::var("DB_MAX_IDLE_TIME") {
            self.database.max_idle_time = parse_duration(&v).unwrap_or(self.database.max_idle_time);
        }
        if let Ok(v) = env::var("DB_QUERY_TIMEOUT") {
            self.database.query_timeout = parse_duration(&v).unwrap_or(self.database.query_timeout);
        }
        if let Ok(v) = env::var("DB_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }

        // Limiter overrides
        if let Ok(v) = env::var("LIMITER_ENABLED") {
            self.limiter.enabled = v.parse().unwrap_or(self.limiter.enabled);
        }
        if let Ok(v) = env::var("LIMITER_RPS") {
            self.limiter.rps = v.parse().unwrap_or(self.limiter.rps);
        }
        if let Ok(v) = env::var("LIMITER_BURST") {
            self.limiter.burst = v.parse().unwrap_or(self.limiter.burst);
        }
        if let Ok(v) = env::var("LIMITER_TRUST_PROXY") {
            self.limiter.trust_proxy = v.parse().unwrap_or(self.limiter.trust_proxy);
        }

        // API overrides
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT") {
            self.api.request_timeout = parse_duration(&v).unwrap_or(self.api.request_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("CORS_TRUSTED_ORIGINS") {
            self.security.cors_trusted_origins = split_origins(&v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 4000,
            database: DatabaseConfig {
                dsn: String::new(),
                max_open_conns: 25,
                max_idle_conns: 25,
                max_idle_time: Duration::from_secs(15 * 60),
                connect_timeout: Duration::from_secs(5),
                query_timeout: Duration::from_secs(3),
                auto_migrate: true,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                sweep_interval: Duration::from_secs(60),
                idle_timeout: Duration::from_secs(3 * 60),
                trust_proxy: false,
            },
            api: ApiConfig {
                max_request_size_bytes: 1_048_576, // 1MB
                request_timeout: Duration::from_secs(30),
            },
            security: SecurityConfig {
                cors_trusted_origins: vec![],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                auto_migrate: false,
                ..Self::development().database
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                dsn: String::new(),
                max_open_conns: 50,
                max_idle_conns: 25,
                max_idle_time: Duration::from_secs(15 * 60),
                connect_timeout: Duration::from_secs(5),
                query_timeout: Duration::from_secs(3),
                auto_migrate: false,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                sweep_interval: Duration::from_secs(60),
                idle_timeout: Duration::from_secs(3 * 60),
                trust_proxy: false,
            },
            api: ApiConfig {
                max_request_size_bytes: 1_048_576,
                request_timeout: Duration::from_secs(10),
            },
            ..Self::development()
        }
    }
}

/// Parses `90s`, `15m`, `1h`, `250ms` or a bare number of seconds
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let err = || ConfigError::InvalidDuration(s.to_string());

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits.parse().map_err(|_| err())?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(n)),
        "ms" => Ok(Duration::from_millis(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 60 * 60)),
        _ => Err(err()),
    }
}

pub fn split_origins(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}
