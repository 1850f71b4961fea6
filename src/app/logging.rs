use super::cli::LogLevel;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// The HTTP stack chatters at debug level on every request; keep it at warn
// unless RUST_LOG asks for more.
const QUIETED_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "rustls", "tower"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("global tracing subscriber already installed")]
    AlreadyInitialized,
}

fn build_filter(level: LogLevel) -> String {
    let mut parts = Vec::with_capacity(QUIETED_TARGETS.len() + 1);
    parts.push(level.as_str().to_string());
    for target in QUIETED_TARGETS {
        parts.push(format!("{target}=warn"));
    }
    parts.join(",")
}

/// Installs the global diagnostic subscriber: `RUST_LOG` when set, otherwise
/// the CLI level with the HTTP stack quieted; compact or JSON lines on
/// stderr.
pub fn init(level: LogLevel, json: bool) -> Result<(), LoggingError> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| build_filter(level));
    let env_filter =
        EnvFilter::try_new(&filter).map_err(|err| LoggingError::InvalidFilter {
            filter,
            reason: err.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init()
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_quiets_the_http_stack() {
        let filter = build_filter(LogLevel::Debug);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("rustls=warn"));
    }

    #[test]
    fn test_filter_strings_are_valid_env_filters() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert!(EnvFilter::try_new(build_filter(level)).is_ok());
        }
    }
}
