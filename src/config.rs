//! Server configuration
//!
//! Settings come from the process environment and are validated once at
//! startup. Anything missing or ambiguous is a hard error rather than a
//! silent fallback.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5002;

/// Origin of the local development frontend, always allowed
pub const DEV_FRONTEND_ORIGIN: &str = "http://localhost:5200";

/// Environment variables read by [`Config::from_env`]
const ENV_KEYS: &[&str] = &[
    "DATABASE_URL",
    "APP_ENV",
    "FRONTEND_URL",
    "HOST",
    "PORT",
    "DB_MAX_CONNECTIONS",
    "PURGE_INTERVAL_SECS",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,

    #[error("DATABASE_URL must be a postgres:// or postgresql:// connection string")]
    UnsupportedDatabaseUrl,

    #[error("APP_ENV is required (production or development)")]
    MissingEnvironment,

    #[error("unknown APP_ENV '{0}', expected production or development")]
    UnknownEnvironment(String),

    #[error("unknown sslmode '{0}'")]
    UnknownTlsMode(String),

    #[error("sslmode={0} is not allowed in production")]
    InsecureTls(TlsMode),

    #[error("FRONTEND_URL must be an http(s) origin, got '{0}'")]
    InvalidFrontendUrl(String),

    #[error("invalid HOST '{0}'")]
    InvalidHost(String),

    #[error("DB_MAX_CONNECTIONS must be at least 1")]
    InvalidPoolSize,

    #[error("invalid configuration: {0}")]
    Extract(#[from] figment::Error),
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// TLS mode for the database connection, named after libpq's `sslmode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl TlsMode {
    /// Whether the mode guarantees an encrypted connection
    pub fn is_enforced(self) -> bool {
        matches!(self, Self::Require | Self::VerifyCa | Self::VerifyFull)
    }
}

impl FromStr for TlsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(ConfigError::UnknownTlsMode(other.to_string())),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        };
        f.write_str(s)
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub tls_mode: TlsMode,
    pub max_connections: u32,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Extra allowed cross-origin frontend, besides the local dev origin
    pub frontend_url: Option<String>,
    /// Period of the expired-image reaper; `None` keeps expired rows
    pub purge_interval: Option<Duration>,
}

impl ServerConfig {
    /// Every origin that may make cross-origin requests
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![DEV_FRONTEND_ORIGIN.to_string()];
        if let Some(url) = &self.frontend_url {
            if url != DEV_FRONTEND_ORIGIN {
                origins.push(url.clone());
            }
        }
        origins
    }
}

/// Complete, validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

/// Raw settings as they arrive from figment providers
#[derive(Debug, Serialize, Deserialize)]
struct RawSettings {
    database_url: Option<String>,
    app_env: Option<String>,
    frontend_url: Option<String>,
    host: String,
    port: u16,
    db_max_connections: u32,
    purge_interval_secs: Option<u64>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            app_env: None,
            frontend_url: None,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            db_max_connections: 10,
            purge_interval_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Env::raw().only(ENV_KEYS)))
    }

    /// Load configuration from an arbitrary figment, layered over defaults
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Figment::from(Serialized::defaults(RawSettings::default()))
            .merge(figment)
            .extract()?;
        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let environment: Environment = non_empty(raw.app_env)
            .ok_or(ConfigError::MissingEnvironment)?
            .parse()?;

        let url = non_empty(raw.database_url).ok_or(ConfigError::MissingDatabaseUrl)?;
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(ConfigError::UnsupportedDatabaseUrl);
        }

        let tls_mode = match sslmode_param(&url) {
            Some(mode) => mode.parse()?,
            None => match environment {
                Environment::Production => TlsMode::VerifyFull,
                Environment::Development => TlsMode::Require,
            },
        };
        if environment == Environment::Production && !tls_mode.is_enforced() {
            return Err(ConfigError::InsecureTls(tls_mode));
        }

        if raw.db_max_connections == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }

        let frontend_url = non_empty(raw.frontend_url)
            .map(|url| normalize_origin(&url))
            .transpose()?;

        let host: IpAddr = raw
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(raw.host.clone()))?;

        Ok(Self {
            environment,
            server: ServerConfig {
                bind_addr: SocketAddr::new(host, raw.port),
                frontend_url,
                purge_interval: raw
                    .purge_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            },
            database: DatabaseConfig {
                url,
                tls_mode,
                max_connections: raw.db_max_connections,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract the `sslmode` query parameter from a connection string
fn sslmode_param(url: &str) -> Option<&str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("sslmode="))
}

/// Origins are compared verbatim against the `Origin` header, which never
/// carries a path or trailing slash
fn normalize_origin(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::InvalidFrontendUrl(url.to_string()))?;
    if rest.is_empty() || rest.contains('/') {
        return Err(ConfigError::InvalidFrontendUrl(url.to_string()));
    }
    Ok(trimmed.to_string())
}
