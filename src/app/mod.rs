//! The shipping binary: CLI surface, stdin ingestion, and the run loop that
//! feeds the transport until EOF or a shutdown signal.

pub mod cli;
pub mod ingest;
pub mod logging;

pub use cli::{Cli, LogLevel};
pub use ingest::LineIngestor;
pub use logging::LoggingError;

use crate::config::{ConfigError, TransportConfig};
use crate::transport::BatchTransport;
use anyhow::Context;
use clap::Parser;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

/// The running application: a transport plus the stdin ingestion loop.
pub struct App {
    transport: BatchTransport,
    ingestor: LineIngestor,
}

impl App {
    pub fn new(config: TransportConfig, service: Option<String>) -> Result<Self, ConfigError> {
        let transport = BatchTransport::new(config)?;
        Ok(Self {
            transport,
            ingestor: LineIngestor::new(service),
        })
    }

    /// Reads stdin line by line until EOF or a termination signal, then
    /// closes the transport so the final partial batch still ships.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut accepted: u64 = 0;
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line.context("reading stdin")? {
                        Some(line) => {
                            if let Some(record) = self.ingestor.record_from_line(&line) {
                                self.transport.write(record);
                                accepted += 1;
                            }
                        }
                        None => {
                            info!(accepted, "stdin closed, flushing remaining records");
                            break;
                        }
                    }
                }
                signal = &mut shutdown => {
                    info!(signal, accepted, "received shutdown signal, flushing remaining records");
                    break;
                }
            }
        }

        // The handle outlives the close, so the totals include the final
        // shutdown flush.
        let handle = self.transport.handle();
        self.transport
            .close()
            .await
            .context("closing the transport")?;

        let stats = handle.stats();
        info!(
            accepted,
            batches_sent = stats.batches_sent,
            batches_failed = stats.batches_failed,
            records_shipped = stats.records_shipped,
            "shipping finished"
        );
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            tracing::warn!(error = %err, "SIGTERM handler unavailable, listening for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

/// Entry point for the `logship` binary.
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.log_level, cli.log_json) {
        eprintln!("logship: failed to initialize logging: {err}");
        process::exit(1);
    }

    let config = match cli.transport_config() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {err}");
            process::exit(1);
        }
    };

    info!(
        version = crate::VERSION,
        endpoint = %config.endpoint_url().map(|url| url.to_string()).unwrap_or_default(),
        flush_interval_ms = config.flush_interval_ms,
        high_water_records = config.high_water_records,
        "starting logship"
    );

    let app = match App::new(config, cli.service.clone()) {
        Ok(app) => app,
        Err(err) => {
            error!("failed to start transport: {err}");
            process::exit(1);
        }
    };

    app.run().await
}
