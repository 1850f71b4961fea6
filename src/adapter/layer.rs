use crate::domain::Record;
use crate::transport::TransportHandle;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets whose events are never shipped, because they are (or feed) the
/// transport's own HTTP machinery: shipping them would turn every send's
/// internal logging into more records to send.
const DEFAULT_SUPPRESSED_TARGETS: &[&str] = &[
    "logship",
    "hyper",
    "reqwest",
    "h2",
    "rustls",
    "tower",
    "want",
    "mio",
];

/// A `tracing-subscriber` layer that converts events into records and writes
/// them to a running transport.
///
/// Stack it next to a normal fmt layer; local output and shipping stay
/// independent. The handle it holds cannot close the transport, so the
/// application keeps control of the flush/shutdown lifecycle. Build the
/// transport first (which is also where a missing API key is rejected),
/// then attach:
///
/// ```no_run
/// use logship::{BatchTransport, ShipLayer, TransportConfig};
/// use tracing_subscriber::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let rt = tokio::runtime::Runtime::new()?;
/// # rt.block_on(async {
/// let transport = BatchTransport::new(TransportConfig::new("my-key"))?;
/// tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer())
///     .with(ShipLayer::new(transport.handle()))
///     .init();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # })?;
/// # Ok(())
/// # }
/// ```
pub struct ShipLayer {
    handle: TransportHandle,
    suppressed_targets: Vec<&'static str>,
}

impl ShipLayer {
    pub fn new(handle: TransportHandle) -> Self {
        Self {
            handle,
            suppressed_targets: DEFAULT_SUPPRESSED_TARGETS.to_vec(),
        }
    }

    /// Adds a target prefix whose events should stay local.
    pub fn suppress_target(mut self, target: &'static str) -> Self {
        self.suppressed_targets.push(target);
        self
    }

    fn is_suppressed(&self, target: &str) -> bool {
        self.suppressed_targets.iter().any(|prefix| {
            target == *prefix
                || (target.starts_with(prefix) && target[prefix.len()..].starts_with("::"))
        })
    }
}

impl<S: Subscriber> Layer<S> for ShipLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_suppressed(metadata.target()) {
            return;
        }

        let mut record = Record::new();
        record.insert("timestamp", chrono::Utc::now().to_rfc3339());
        record.insert("level", level_label(*metadata.level()));
        record.insert("target", metadata.target());

        let mut visitor = FieldVisitor {
            record: &mut record,
        };
        event.record(&mut visitor);

        self.handle.write(record);
    }
}

fn level_label(level: Level) -> &'static str {
    if level == Level::ERROR {
        "error"
    } else if level == Level::WARN {
        "warn"
    } else if level == Level::INFO {
        "info"
    } else if level == Level::DEBUG {
        "debug"
    } else {
        "trace"
    }
}

struct FieldVisitor<'a> {
    record: &'a mut Record,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record.insert(field.name(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record.insert(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record.insert(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record.insert(field.name(), value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record.insert(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // The event's format string arrives here as the `message` field;
        // Debug on `Arguments` renders it without extra quoting.
        self.record.insert(field.name(), format!("{value:?}"));
    }
}
