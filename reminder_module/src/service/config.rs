use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use send_messages_module::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS};

use super::chat::{default_generative_url, DEFAULT_GENERATIVE_MODEL};

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_TIMEZONE: &str = "Asia/Taipei";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Firebase { database_url: String, secret: String },
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    /// Missing token leaves outbound messaging disabled
    pub line_channel_access_token: Option<String>,
    /// Missing secret makes every webhook fail verification
    pub line_channel_secret: Option<String>,
    pub line_api_base_url: String,
    pub line_http_timeout: Duration,
    pub generative_api_key: Option<String>,
    pub generative_api_url: String,
    pub timezone: Tz,
    pub scheduler_poll_interval: Duration,
    pub scheduler_ready_retry: Duration,
    pub max_body_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env_var_non_empty("REMINDER_SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_var_non_empty("PORT")
            .map(|value| ("PORT", value))
            .or_else(|| env_var_non_empty("REMINDER_SERVICE_PORT").map(|value| ("REMINDER_SERVICE_PORT", value)))
        {
            Some((key, value)) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key, value })?,
            None => DEFAULT_PORT,
        };

        let store = match env_var_non_empty("STORE_BACKEND")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("firebase") => StoreBackend::Firebase {
                database_url: env_var_non_empty("FIREBASE_DATABASE_URL")
                    .ok_or(ConfigError::Missing("FIREBASE_DATABASE_URL"))?,
                secret: env_var_non_empty("FIREBASE_DATABASE_SECRET")
                    .ok_or(ConfigError::Missing("FIREBASE_DATABASE_SECRET"))?,
            },
            Some("sqlite") => StoreBackend::Sqlite {
                path: env_var_non_empty("DOCUMENT_STORE_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("DOCUMENT_STORE_PATH"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let timezone_name =
            env_var_non_empty("REMINDER_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid {
                key: "REMINDER_TIMEZONE",
                value: timezone_name.clone(),
            })?;

        let line_api_base_url =
            env_var_non_empty("LINE_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let line_http_timeout = Duration::from_secs(env_u64("LINE_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));

        let generative_model = env_var_non_empty("GENERATIVE_MODEL")
            .unwrap_or_else(|| DEFAULT_GENERATIVE_MODEL.to_string());
        let generative_api_url = env_var_non_empty("GENERATIVE_API_URL")
            .unwrap_or_else(|| default_generative_url(&generative_model));

        let scheduler_poll_interval = Duration::from_secs(env_u64("SCHEDULER_POLL_INTERVAL_SECS", 60));
        let scheduler_ready_retry = Duration::from_secs(env_u64("SCHEDULER_READY_RETRY_SECS", 5));
        let max_body_bytes = env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            host,
            port,
            store,
            line_channel_access_token: env_var_non_empty("LINE_CHANNEL_ACCESS_TOKEN"),
            line_channel_secret: env_var_non_empty("LINE_CHANNEL_SECRET"),
            line_api_base_url,
            line_http_timeout,
            generative_api_key: env_var_non_empty("GENERATIVE_API_KEY"),
            generative_api_url,
            timezone,
            scheduler_poll_interval,
            scheduler_ready_retry,
            max_body_bytes,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host: IpAddr = self.host.parse().map_err(|_| ConfigError::Invalid {
            key: "REMINDER_SERVICE_HOST",
            value: self.host.clone(),
        })?;
        Ok(SocketAddr::new(host, self.port))
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
