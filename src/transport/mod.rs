//! The buffered batch transport: the facade producers talk to, the flush
//! dispatcher behind it, and the periodic scheduler.

pub mod scheduler;

pub use scheduler::{FlushScheduler, SchedulerState};

use crate::buffer::{BatchBuffer, BufferConfig, BufferStats, FlushTrigger};
use crate::config::{ConfigError, TransportConfig};
use crate::domain::Record;
use crate::sender::{
    AtomicTransportStats, BatchSender, HttpSender, ReqwestSender, TransportStats,
    build_pooled_client,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Pending flush requests beyond this just coalesce into the ones queued.
const TRIGGER_QUEUE_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("in-flight sends did not settle within {0:?}")]
    ShutdownTimeout(Duration),
}

struct TransportInner {
    buffer: Arc<BatchBuffer>,
    triggers: mpsc::Sender<FlushTrigger>,
    stats: Arc<AtomicTransportStats>,
    closed: AtomicBool,
}

impl TransportInner {
    fn write(&self, record: Record) {
        if self.closed.load(Ordering::Acquire) {
            self.stats.record_dropped_after_close();
            debug!("record dropped: transport already closed");
            return;
        }

        let outcome = self.buffer.append(record);
        if outcome.flush_needed {
            // A full trigger queue already guarantees an imminent drain, so
            // losing this request changes nothing.
            let _ = self.triggers.try_send(FlushTrigger::HighWater);
        }
    }

    fn flush(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.triggers.try_send(FlushTrigger::Manual);
    }
}

/// A cloneable write-side handle to a running transport.
///
/// Handles can outlive the facade's ownership moves (the tracing adapter
/// holds one, for example) but cannot close the transport; once it is
/// closed, their writes are counted, logged at debug, and dropped.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<TransportInner>,
}

impl TransportHandle {
    /// Enqueue one record. Synchronous, non-blocking, infallible.
    pub fn write(&self, record: Record) {
        self.inner.write(record);
    }

    /// Request a flush cycle now instead of waiting for the timer.
    pub fn flush(&self) {
        self.inner.flush();
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.stats.snapshot()
    }
}

/// The buffered batch transport.
///
/// Owns the buffer, the flush scheduler, the dispatcher task, and the HTTP
/// sending stack. Records written here accumulate until a timer tick, a
/// high-water crossing, or a manual flush drains them as one batch, sent
/// fire-and-forget: delivery failures are logged and counted, never surfaced
/// to producers, and failed batches are not retried.
pub struct BatchTransport {
    inner: Arc<TransportInner>,
    scheduler: FlushScheduler,
    dispatcher: JoinHandle<()>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
}

impl BatchTransport {
    /// Builds a transport with the default pooled HTTPS stack.
    ///
    /// Validates the configuration synchronously: a missing API key is
    /// rejected here, before any network activity. Must be called from
    /// within a Tokio runtime; no request leaves until the first flush.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;
        let client = match config.client.clone() {
            Some(client) => client,
            None => build_pooled_client(&config.pool_options(), config.request_timeout())
                .map_err(ConfigError::HttpClient)?,
        };
        let http: Arc<dyn HttpSender> = Arc::new(ReqwestSender::new(
            client,
            endpoint,
            config.api_key.clone(),
            config.request_timeout(),
        ));
        Ok(Self::build(config, http))
    }

    /// Builds a transport around a caller-supplied sending capability,
    /// replacing the entire HTTP stack while keeping all batching behavior.
    pub fn with_http_sender(
        config: TransportConfig,
        http: Arc<dyn HttpSender>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, http))
    }

    fn build(config: TransportConfig, http: Arc<dyn HttpSender>) -> Self {
        let stats = Arc::new(AtomicTransportStats::new());
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_DEPTH);

        let buffer = Arc::new(BatchBuffer::new(BufferConfig {
            high_water_records: config.high_water_records,
            high_water_bytes: config.high_water_bytes,
        }));
        let inner = Arc::new(TransportInner {
            buffer: Arc::clone(&buffer),
            triggers: trigger_tx.clone(),
            stats: Arc::clone(&stats),
            closed: AtomicBool::new(false),
        });

        // The dispatcher deliberately does not hold `inner`: once the
        // transport and every handle are gone, the trigger senders drop, the
        // channel closes, and the task winds itself down.
        let shutdown = CancellationToken::new();
        let sender = BatchSender::new(http, stats);
        let dispatcher = tokio::spawn(run_dispatcher(
            buffer,
            sender,
            trigger_rx,
            shutdown.clone(),
            config.max_in_flight,
        ));
        let scheduler = FlushScheduler::start(config.flush_interval(), trigger_tx);

        info!(
            flush_interval_ms = config.flush_interval_ms,
            high_water_records = config.high_water_records,
            max_in_flight = config.max_in_flight,
            "batch transport started"
        );

        Self {
            inner,
            scheduler,
            dispatcher,
            shutdown,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Enqueue one record. Synchronous, non-blocking, infallible.
    pub fn write(&self, record: Record) {
        self.inner.write(record);
    }

    /// Request a flush cycle now instead of waiting for the timer. This is
    /// the only trigger in manual-flush-only mode (zero flush interval).
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// A cloneable write-side handle, for producers that should not be able
    /// to close the transport.
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.stats.snapshot()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.inner.buffer.stats()
    }

    /// Records currently waiting for the next flush.
    pub fn pending_records(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Graceful shutdown: stop the timer, settle in-flight sends, flush what
    /// remains once, all within the configured shutdown timeout.
    ///
    /// Shutdown is signalled out of band rather than queued behind pending
    /// flush triggers, so a dispatcher wedged on slow sends cannot stall this
    /// call past its deadline. Records written concurrently with `close` are
    /// delivered if they land before the final drain and dropped with a
    /// diagnostic otherwise; once the timeout expires remaining sends are
    /// aborted and `TransportError::ShutdownTimeout` is returned.
    pub async fn close(self) -> Result<(), TransportError> {
        info!("closing batch transport");
        self.inner.closed.store(true, Ordering::Release);
        self.scheduler.stop().await;
        self.shutdown.cancel();

        let mut dispatcher = self.dispatcher;
        match tokio::time::timeout(self.shutdown_timeout, &mut dispatcher).await {
            Ok(Ok(())) => {
                info!("batch transport closed");
                Ok(())
            }
            Ok(Err(err)) => {
                warn!(error = %err, "flush dispatcher ended abnormally during close");
                Ok(())
            }
            Err(_) => {
                dispatcher.abort();
                Err(TransportError::ShutdownTimeout(self.shutdown_timeout))
            }
        }
    }
}

impl std::fmt::Debug for BatchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTransport")
            .field("pending_records", &self.pending_records())
            .field("scheduler", &self.scheduler.state())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

/// One task per transport: receives flush triggers, drains the buffer, and
/// spawns a detached send per non-empty batch, bounded by the in-flight
/// semaphore. Waiting for a permit delays dispatch of further batches, never
/// producer writes.
///
/// The `shutdown` token preempts the wait for the next trigger and leads to
/// the final drain, so the task winds down no matter how backed up the
/// trigger queue is. A permit wait is not preempted (it resolves as soon as
/// a send settles, and the close deadline bounds the whole task regardless).
/// The same final drain runs when the trigger channel closes because the
/// transport and every handle were dropped without `close()`.
async fn run_dispatcher(
    buffer: Arc<BatchBuffer>,
    sender: BatchSender,
    mut triggers: mpsc::Receiver<FlushTrigger>,
    shutdown: CancellationToken,
    max_in_flight: usize,
) {
    let limiter = Arc::new(Semaphore::new(max_in_flight));
    let mut in_flight = JoinSet::new();

    loop {
        let trigger = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = triggers.recv() => match received {
                Some(trigger) => trigger,
                None => break,
            },
        };

        // Reap completed sends so the join set never grows unbounded.
        while in_flight.try_join_next().is_some() {}

        let batch = buffer.drain(trigger);
        if batch.is_empty() {
            sender.stats().record_empty_flush();
            debug!(
                trigger = trigger.as_str(),
                "flush cycle found nothing buffered, skipping network call"
            );
            continue;
        }

        let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
            break;
        };
        let task_sender = sender.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            // ship() logs and counts every outcome.
            let _ = task_sender.ship(batch).await;
        });
    }

    // Let the detached sends settle first so the shutdown batch is the last
    // request on the wire, then drain whatever is still buffered and ship it
    // inline. close() bounds all of this with the shutdown timeout.
    while in_flight.join_next().await.is_some() {}
    let batch = buffer.drain(FlushTrigger::Shutdown);
    if batch.is_empty() {
        sender.stats().record_empty_flush();
    } else {
        let _ = sender.ship(batch).await;
    }
}
