use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// How bearer tokens are verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtKey {
    Secret(String),
    EcComponents { x: String, y: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub jwt_key: JwtKey,
    pub jwt_audience: String,
    pub database_url: Option<String>,
    pub realtime_url: String,
    pub min_participants_to_start: usize,
    pub retention_secs: u32,
    pub sweep_interval_secs: u64,
    pub collaborator_timeout_ms: u64,
    pub archive_max_concurrent: usize,
    pub archive_min_delay_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn init() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value source. `init` reads the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&var, "PORT", 3000u16)?;

        let jwt_key = match (var("JWK_X"), var("JWK_Y"), var("JWT_SECRET")) {
            (Some(x), Some(y), _) => JwtKey::EcComponents { x, y },
            (_, _, Some(secret)) => JwtKey::Secret(secret),
            _ => return Err(ConfigError::MissingVar("JWT_SECRET")),
        };

        let realtime_url = var("REALTIME_URL")
            .unwrap_or_else(|| format!("ws://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            log_level: var("LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string())
                .to_lowercase(),
            jwt_key,
            jwt_audience: var("JWT_AUDIENCE").unwrap_or_else(|| "authenticated".to_string()),
            database_url: var("DATABASE_URL"),
            realtime_url,
            min_participants_to_start: parse_or(&var, "RACE_MIN_PARTICIPANTS", 1)?,
            retention_secs: parse_or(&var, "RACE_RETENTION_SECS", 300)?,
            sweep_interval_secs: parse_or(&var, "RACE_SWEEP_INTERVAL_SECS", 30)?,
            collaborator_timeout_ms: parse_or(&var, "COLLABORATOR_TIMEOUT_MS", 2000)?,
            archive_max_concurrent: parse_or(&var, "ARCHIVE_MAX_CONCURRENT", 4)?,
            archive_min_delay_ms: parse_or(&var, "ARCHIVE_MIN_DELAY_MS", 0)?,
            shutdown_grace_secs: parse_or(&var, "SHUTDOWN_GRACE_SECS", 10)?,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
