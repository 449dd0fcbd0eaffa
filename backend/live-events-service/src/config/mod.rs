use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Default heartbeat period for open streams
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub session: SessionConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HS256 secret shared with the web app's auth layer
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub heartbeat_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("APP_PORT is not a valid port: {raw}")))?,
            None => 8000,
        };

        let jwt_secret = lookup("SESSION_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("SESSION_JWT_SECRET missing".into()))?;

        let heartbeat_secs = match lookup("HEARTBEAT_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!("HEARTBEAT_INTERVAL_SECS is not a number: {raw}"))
            })?,
            None => DEFAULT_HEARTBEAT_INTERVAL_SECS,
        };
        if heartbeat_secs == 0 {
            return Err(AppError::Config(
                "HEARTBEAT_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            session: SessionConfig { jwt_secret },
            stream: StreamConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}
