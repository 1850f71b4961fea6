use crate::buffer::FlushTrigger;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Scheduler lifecycle, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer task exists (interval disabled, or the scheduler stopped).
    Idle,
    /// The timer task is running and delivering ticks.
    Armed,
}

/// The periodic flush trigger.
///
/// Owns its timer task outright: `start` arms it, `stop` cancels and joins
/// it, after which no further tick can be delivered. A transport configured
/// with a zero interval never arms a timer and relies on manual flushes and
/// the high-water trigger alone.
#[derive(Debug)]
pub struct FlushScheduler {
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl FlushScheduler {
    /// Arms the timer iff `interval` is non-zero. Each tick asks the
    /// dispatcher for one `FlushTrigger::Interval` cycle; ticks fire whether
    /// or not the buffer holds anything, and the dispatcher decides whether
    /// a cycle is a no-op.
    pub fn start(interval: Duration, ticks: mpsc::Sender<FlushTrigger>) -> Self {
        let cancel = CancellationToken::new();
        if interval.is_zero() {
            return Self {
                handle: None,
                cancel,
            };
        }

        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; swallow it so
            // the first flush lands one full period after construction.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // The send itself must also lose to cancellation:
                        // with the trigger queue full it would otherwise
                        // park until the dispatcher frees a slot, and
                        // stop() would wait right along with it.
                        tokio::select! {
                            _ = task_cancel.cancelled() => break,
                            sent = ticks.send(FlushTrigger::Interval) => {
                                if sent.is_err() {
                                    debug!("flush dispatcher gone, stopping timer");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
            cancel,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match &self.handle {
            Some(handle) if !handle.is_finished() => SchedulerState::Armed,
            _ => SchedulerState::Idle,
        }
    }

    /// Cancels the timer and waits for its task to finish. Once this
    /// returns, no tick will ever be delivered again.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        // An abandoned transport must not keep ticking in the background.
        self.cancel.cancel();
    }
}
