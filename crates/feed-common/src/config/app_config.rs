//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). The feed runs against a remote backend when one is configured
//! and falls back to a client-only cache otherwise.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub mode: FeedMode,
    pub cache: CacheConfig,
    pub feed: FeedSettings,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Which feed store backs the session
///
/// Chosen once at startup and fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub enum FeedMode {
    /// Authoritative PostgreSQL store with Redis push notifications
    Remote {
        database: DatabaseConfig,
        redis: RedisConfig,
    },
    /// Single-device mode on top of the local cache
    Local,
}

impl FeedMode {
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Local => "local",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Client-local cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
}

/// Where the client-local cache lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// One file per key under a directory
    File { dir: PathBuf },
    /// Plain keys in Redis
    Redis(RedisConfig),
    /// Process memory only
    Memory,
}

impl CacheBackend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Redis(_) => "redis",
            Self::Memory => "memory",
        }
    }
}

/// Feed engine tuning
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Period of the background expiry sweep
    pub sweep_interval_secs: u64,
    /// Delay before the change subscriber reconnects
    pub subscriber_reconnect_ms: u64,
}

impl FeedSettings {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            subscriber_reconnect_ms: default_subscriber_reconnect_ms(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "ephemeral-feed".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.feed-cache")
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_subscriber_reconnect_ms() -> u64 {
    1000
}

/// Values shipped in `.env.example` that must be replaced before use
fn is_placeholder(value: &str) -> bool {
    value.trim_start().starts_with("your_")
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a backend is requested but its credentials are
    /// missing or still set to placeholder values.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let database_url = vars.credential("DATABASE_URL")?;
        let redis_url = vars.credential("REDIS_URL")?;

        let redis = |url: String| RedisConfig {
            url,
            max_connections: vars.parse_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections),
        };

        let remote = match vars.get("FEED_MODE").map(|s| s.to_lowercase()).as_deref() {
            Some("remote") => true,
            Some("local") => false,
            Some(other) => return Err(ConfigError::InvalidValue("FEED_MODE", other.to_string())),
            None => database_url.is_some() || redis_url.is_some(),
        };

        let mode = if remote {
            FeedMode::Remote {
                database: DatabaseConfig {
                    url: database_url.ok_or(ConfigError::MissingVar("DATABASE_URL"))?,
                    max_connections: vars
                        .parse_or("DATABASE_MAX_CONNECTIONS", default_max_connections),
                    min_connections: vars
                        .parse_or("DATABASE_MIN_CONNECTIONS", default_min_connections),
                },
                redis: redis(redis_url.clone().ok_or(ConfigError::MissingVar("REDIS_URL"))?),
            }
        } else {
            FeedMode::Local
        };

        let backend = match vars.get("FEED_CACHE_BACKEND").map(|s| s.to_lowercase()).as_deref() {
            None | Some("file") => CacheBackend::File {
                dir: vars
                    .get("FEED_CACHE_DIR")
                    .map_or_else(default_cache_dir, PathBuf::from),
            },
            Some("redis") => CacheBackend::Redis(redis(
                redis_url.ok_or(ConfigError::MissingVar("REDIS_URL"))?,
            )),
            Some("memory") => CacheBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue("FEED_CACHE_BACKEND", other.to_string()));
            }
        };

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars
                    .get("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            mode,
            cache: CacheConfig { backend },
            feed: FeedSettings {
                sweep_interval_secs: vars
                    .parse_or("FEED_SWEEP_INTERVAL_SECS", default_sweep_interval_secs)
                    .max(1),
                subscriber_reconnect_ms: vars
                    .parse_or("FEED_SUBSCRIBER_RECONNECT_MS", default_subscriber_reconnect_ms),
            },
        })
    }
}

/// Thin wrapper over the lookup closure
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value of `key`
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: fn() -> T) -> T {
        self.get(key)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_else(default)
    }

    /// Backend credential that must not be left at its placeholder
    fn credential(&self, key: &'static str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            Some(value) if is_placeholder(&value) => Err(ConfigError::Placeholder(key)),
            other => Ok(other),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Environment variable {0} still holds its placeholder value")]
    Placeholder(&'static str),
}
