/*
 * Responsibility
 * - Read settings from the environment (.env supported via dotenvy)
 * - Validate them up front (missing / invalid values fail startup)
 * - Application policies live in a separate TOML file (see services::policy)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::services::auth::TokenAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Identity provider
    pub authorize_url: Url,
    pub applications_file: PathBuf,

    // Token verification
    pub token_issuer: String,
    pub token_algorithm: TokenAlgorithm,
    // PEM public key, or the shared secret for HS256
    pub token_key: String,
    pub token_leeway_seconds: u64,

    // HMAC key for the authorize `state` parameter
    pub state_secret: String,

    pub request_timeout_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("authorize_url", &self.authorize_url.as_str())
            .field("applications_file", &self.applications_file)
            .field("token_issuer", &self.token_issuer)
            .field("token_algorithm", &self.token_algorithm)
            .field("token_leeway_seconds", &self.token_leeway_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let number = |key: &'static str, default: u64| match var(key) {
            Some(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        };

        let port = u16::try_from(number("PORT", 8080)?).map_err(|_| ConfigError::Invalid("PORT"))?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let authorize_url = Url::parse(&required("AUTHORIZE_URL")?)
            .map_err(|_| ConfigError::Invalid("AUTHORIZE_URL"))?;
        if !matches!(authorize_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("AUTHORIZE_URL"));
        }

        let applications_file = var("APPLICATIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("applications.toml"));

        let token_issuer = required("TOKEN_ISSUER")?;

        let token_algorithm = var("TOKEN_ALGORITHM")
            .unwrap_or_else(|| "RS256".to_string())
            .parse::<TokenAlgorithm>()
            .map_err(|_| ConfigError::Invalid("TOKEN_ALGORITHM"))?;

        let token_key = required("TOKEN_KEY")?.replace("\\n", "\n");

        let token_leeway_seconds = number("TOKEN_LEEWAY_SECONDS", 60)?;

        let state_secret = required("STATE_SECRET")?;
        if state_secret.len() < 16 {
            return Err(ConfigError::Invalid("STATE_SECRET"));
        }

        let request_timeout_seconds = number("REQUEST_TIMEOUT_SECONDS", 10)?;
        if request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            authorize_url,
            applications_file,
            token_issuer,
            token_algorithm,
            token_key,
            token_leeway_seconds,
            state_secret,
            request_timeout_seconds,
        })
    }
}
