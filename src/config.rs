//! Transport configuration: construction options, environment and file
//! loading, and the validation that runs before anything touches the
//! network.

use crate::sender::PoolOptions;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("api key is required but missing or empty")]
    MissingApiKey,
    #[error("invalid endpoint URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid environment value for {name}: {reason}")]
    Env { name: &'static str, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

/// Construction options for a [`BatchTransport`](crate::BatchTransport).
///
/// Immutable once the transport is built. The usual spelling is struct
/// update syntax over the defaults:
///
/// ```
/// use logship::TransportConfig;
///
/// let config = TransportConfig {
///     api_key: "my-key".into(),
///     flush_interval_ms: 250,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Credential presented as the HTTP Basic auth username (empty
    /// password). Required; construction fails without it.
    pub api_key: String,

    /// Ingestion hostname, used unless `endpoint` overrides the full URL.
    pub host: String,

    /// TCP port for the ingestion endpoint.
    pub port: u16,

    /// URL path batches are POSTed to.
    pub ingest_path: String,

    /// Full endpoint URL override. When set, `host`/`port`/`ingest_path`
    /// are ignored. Accepts plain `http` for local development targets.
    pub endpoint: Option<String>,

    /// Flush timer period. Zero disables the timer entirely, leaving
    /// manual flushes and the high-water trigger as the only drains.
    pub flush_interval_ms: u64,

    /// Queued record count that forces a flush ahead of the timer.
    pub high_water_records: usize,

    /// Estimated queued bytes that force a flush ahead of the timer.
    pub high_water_bytes: usize,

    /// Deadline applied to every batch request.
    pub request_timeout_ms: u64,

    /// How long `close()` waits for in-flight sends before giving up.
    pub shutdown_timeout_ms: u64,

    /// Upper bound on concurrently in-flight batch requests.
    pub max_in_flight: usize,

    /// Idle sockets kept alive per host by the default client.
    pub pool_max_idle_per_host: usize,

    /// Idle pooled sockets are closed after this long unused.
    pub pool_idle_timeout_ms: u64,

    /// Caller-supplied HTTP client. Substitutes the pool while keeping the
    /// default request construction; use
    /// [`BatchTransport::with_http_sender`](crate::BatchTransport::with_http_sender)
    /// to substitute the whole HTTP stack instead.
    #[serde(skip)]
    pub client: Option<reqwest::Client>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: "ingest.logship.io".to_string(),
            port: 443,
            ingest_path: "/frames".to_string(),
            endpoint: None,
            flush_interval_ms: 1000,
            high_water_records: 1000,
            high_water_bytes: 1024 * 1024,
            request_timeout_ms: 30_000,
            shutdown_timeout_ms: 5_000,
            max_in_flight: 8,
            pool_max_idle_per_host: 10,
            pool_idle_timeout_ms: 60_000,
            client: None,
        }
    }
}

impl TransportConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from `LOGSHIP_*` environment variables, starting
    /// from the defaults. Validates before returning.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        load_env_string("LOGSHIP_API_KEY", &mut config.api_key);
        load_env_string("LOGSHIP_HOST", &mut config.host);
        load_env_var("LOGSHIP_PORT", &mut config.port)?;
        load_env_string("LOGSHIP_INGEST_PATH", &mut config.ingest_path);
        if let Ok(endpoint) = std::env::var("LOGSHIP_ENDPOINT")
            && !endpoint.is_empty()
        {
            config.endpoint = Some(endpoint);
        }
        load_env_var("LOGSHIP_FLUSH_INTERVAL_MS", &mut config.flush_interval_ms)?;
        load_env_var("LOGSHIP_HIGH_WATER_RECORDS", &mut config.high_water_records)?;
        load_env_var("LOGSHIP_HIGH_WATER_BYTES", &mut config.high_water_bytes)?;
        load_env_var("LOGSHIP_REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms)?;
        load_env_var(
            "LOGSHIP_SHUTDOWN_TIMEOUT_MS",
            &mut config.shutdown_timeout_ms,
        )?;
        load_env_var("LOGSHIP_MAX_IN_FLIGHT", &mut config.max_in_flight)?;
        load_env_var(
            "LOGSHIP_POOL_MAX_IDLE",
            &mut config.pool_max_idle_per_host,
        )?;
        load_env_var(
            "LOGSHIP_POOL_IDLE_TIMEOUT_MS",
            &mut config.pool_idle_timeout_ms,
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file. Keys mirror the field names;
    /// missing keys keep their defaults. Validates before returning.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every construction-time requirement. A transport refuses to
    /// build on the first violation; nothing here touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidOption {
                name: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidOption {
                name: "port",
                reason: "must be nonzero".to_string(),
            });
        }
        if !self.ingest_path.starts_with('/') {
            return Err(ConfigError::InvalidOption {
                name: "ingest_path",
                reason: format!("must start with '/', got `{}`", self.ingest_path),
            });
        }
        if self.high_water_records == 0 {
            return Err(ConfigError::InvalidOption {
                name: "high_water_records",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.high_water_bytes == 0 {
            return Err(ConfigError::InvalidOption {
                name: "high_water_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidOption {
                name: "request_timeout_ms",
                reason: "must be nonzero".to_string(),
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidOption {
                name: "max_in_flight",
                reason: "must be at least 1".to_string(),
            });
        }
        self.endpoint_url().map(|_| ())
    }

    /// The URL batches are POSTed to: the `endpoint` override verbatim, or
    /// `https://{host}:{port}{ingest_path}` assembled from parts.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}:{}{}", self.host, self.port, self.ingest_path),
        };

        let url = Url::parse(&raw).map_err(|err| ConfigError::InvalidUrl {
            url: raw.clone(),
            reason: err.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: raw,
                reason: "missing host".to_string(),
            });
        }
        Ok(url)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_idle_per_host: self.pool_max_idle_per_host,
            idle_timeout: Duration::from_millis(self.pool_idle_timeout_ms),
        }
    }
}

// The api key is a credential; Debug output lands in logs.
impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ingest_path", &self.ingest_path)
            .field("endpoint", &self.endpoint)
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("high_water_records", &self.high_water_records)
            .field("high_water_bytes", &self.high_water_bytes)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .field("max_in_flight", &self.max_in_flight)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_ms", &self.pool_idle_timeout_ms)
            .field("custom_client", &self.client.is_some())
            .finish()
    }
}

fn load_env_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name)
        && !value.is_empty()
    {
        *target = value;
    }
}

fn load_env_var<T>(name: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value.parse().map_err(|err: T::Err| ConfigError::Env {
            name,
            reason: err.to_string(),
        })?;
    }
    Ok(())
}
