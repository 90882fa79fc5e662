use std::env;
use std::fmt;
use thiserror::Error;

/// Default outbound timeout applied to both providers.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;
/// Default cap on the size of an uploaded document.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the relay server.
#[derive(Clone)]
pub struct Config {
    /// Credential for the hosted completion API. Completions fail when absent.
    pub groq_api_key: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Timeout applied to every outbound provider call.
    pub request_timeout_secs: u64,
    /// Maximum accepted size of a multipart upload body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let positive = |key: &str| parse_positive(key, read(key));
        Ok(Self {
            groq_api_key: read("GROQ_API_KEY"),
            server_port: read("SERVER_PORT")
                .map(|value| {
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            request_timeout_secs: positive("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: positive("MAX_UPLOAD_BYTES")?
                .map(|value| {
                    usize::try_from(value)
                        .map_err(|_| ConfigError::InvalidValue("MAX_UPLOAD_BYTES".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            server_port: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("has_groq_api_key", &self.groq_api_key.is_some())
            .field("server_port", &self.server_port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

fn parse_positive(key: &str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|value| match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        })
        .transpose()
}

/// Build the configuration from the process environment and log a redacted summary.
///
/// Call after `.env` has been loaded and tracing is installed.
pub fn load_config() -> Result<Config, ConfigError> {
    let config = Config::from_env()?;
    tracing::debug!(
        has_groq_api_key = config.groq_api_key.is_some(),
        server_port = ?config.server_port,
        request_timeout_secs = config.request_timeout_secs,
        max_upload_bytes = config.max_upload_bytes,
        "Loaded configuration"
    );
    if config.groq_api_key.is_none() {
        tracing::warn!("GROQ_API_KEY is not set; completion requests will be rejected");
    }
    Ok(config)
}
