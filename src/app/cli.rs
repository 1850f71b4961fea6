use crate::config::{ConfigError, TransportConfig};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity of the local diagnostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Command line surface of the shipping binary.
///
/// Every transport option is also reachable through its `LOGSHIP_*`
/// environment variable, so the binary drops into containers without a
/// wrapper script. Explicit flags win over the config file, which wins over
/// the built-in defaults.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Read log lines from stdin and ship them to an ingestion endpoint", long_about = None)]
pub struct Cli {
    /// API key presented as the HTTP Basic auth username
    #[arg(long, env = "LOGSHIP_API_KEY")]
    pub api_key: Option<String>,

    /// Ingestion hostname
    #[arg(long, env = "LOGSHIP_HOST")]
    pub host: Option<String>,

    /// Ingestion port
    #[arg(long, env = "LOGSHIP_PORT")]
    pub port: Option<u16>,

    /// URL path batches are POSTed to
    #[arg(long, env = "LOGSHIP_INGEST_PATH")]
    pub ingest_path: Option<String>,

    /// Full endpoint URL override; plain http is accepted for local targets
    #[arg(long, env = "LOGSHIP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Milliseconds between timed flushes; 0 disables the timer
    #[arg(long, env = "LOGSHIP_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,

    /// Queued record count that forces a flush ahead of the timer
    #[arg(long, env = "LOGSHIP_HIGH_WATER_RECORDS")]
    pub high_water_records: Option<usize>,

    /// Estimated queued bytes that force a flush ahead of the timer
    #[arg(long, env = "LOGSHIP_HIGH_WATER_BYTES")]
    pub high_water_bytes: Option<usize>,

    /// Per-request deadline in milliseconds
    #[arg(long, env = "LOGSHIP_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Upper bound on concurrently in-flight batch requests
    #[arg(long, env = "LOGSHIP_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// TOML configuration file (keys mirror the transport option names)
    #[arg(long, env = "LOGSHIP_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Level for local diagnostics on stderr
    #[arg(long, env = "LOGSHIP_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Emit local diagnostics as JSON lines instead of compact text
    #[arg(long, env = "LOGSHIP_LOG_JSON")]
    pub log_json: bool,

    /// Service name stamped onto every shipped record
    #[arg(long, env = "LOGSHIP_SERVICE")]
    pub service: Option<String>,
}

impl Cli {
    /// Resolves the layered configuration: config file first (when given),
    /// then any explicit flag or environment override, validated at the end
    /// so a partial file plus a CLI api key still builds.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str::<TransportConfig>(&content)?
            }
            None => TransportConfig::default(),
        };

        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ingest_path) = &self.ingest_path {
            config.ingest_path = ingest_path.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(flush_interval_ms) = self.flush_interval_ms {
            config.flush_interval_ms = flush_interval_ms;
        }
        if let Some(high_water_records) = self.high_water_records {
            config.high_water_records = high_water_records;
        }
        if let Some(high_water_bytes) = self.high_water_bytes {
            config.high_water_bytes = high_water_bytes;
        }
        if let Some(request_timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = request_timeout_ms;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.max_in_flight = max_in_flight;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("logship").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--api-key",
            "k1",
            "--host",
            "logs.example.com",
            "--flush-interval-ms",
            "250",
        ]);
        let config = cli.transport_config().unwrap();
        assert_eq!(config.api_key, "k1");
        assert_eq!(config.host, "logs.example.com");
        assert_eq!(config.flush_interval_ms, 250);
        // Untouched options keep their defaults.
        assert_eq!(config.port, 443);
        assert_eq!(config.high_water_records, 1000);
    }

    #[test]
    fn test_missing_api_key_fails_resolution() {
        let cli = parse(&[]);
        assert!(matches!(
            cli.transport_config(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_flag_becomes_override() {
        let cli = parse(&["--api-key", "k", "--endpoint", "http://127.0.0.1:9600/frames"]);
        let config = cli.transport_config().unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("http://127.0.0.1:9600/frames")
        );
    }

    #[test]
    fn test_log_level_parses_case_insensitively() {
        let cli = parse(&["--api-key", "k", "--log-level", "debug"]);
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.log_level.as_str(), "debug");
    }
}
