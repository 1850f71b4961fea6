use crate::domain::Record;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

static LEVEL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn level_pattern() -> Option<&'static Regex> {
    LEVEL_PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(FATAL|ERROR|WARN(?:ING)?|INFO|DEBUG|TRACE)\b").ok())
        .as_ref()
}

/// Turns raw stdin lines into shippable records.
///
/// JSON object lines are taken verbatim as the record's fields; anything else
/// is wrapped as `{"message": <line>}` with a severity sniffed from the usual
/// level markers. Every record is stamped with the local hostname, the
/// configured service name, and an RFC 3339 timestamp unless the line already
/// carries those fields.
pub struct LineIngestor {
    host: Option<String>,
    service: Option<String>,
}

impl LineIngestor {
    pub fn new(service: Option<String>) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty());
        Self { host, service }
    }

    #[cfg(test)]
    fn with_host(host: Option<String>, service: Option<String>) -> Self {
        Self { host, service }
    }

    /// Converts one input line, or `None` for blank lines.
    pub fn record_from_line(&self, line: &str) -> Option<Record> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let mut record = parse_json_object(line).unwrap_or_else(|| plain_record(line));
        self.enrich(&mut record);
        Some(record)
    }

    fn enrich(&self, record: &mut Record) {
        if !record.contains_key("timestamp") {
            record.insert("timestamp", chrono::Utc::now().to_rfc3339());
        }
        if let Some(host) = &self.host
            && !record.contains_key("host")
        {
            record.insert("host", host.clone());
        }
        if let Some(service) = &self.service
            && !record.contains_key("service")
        {
            record.insert("service", service.clone());
        }
    }
}

/// Attempts to read the line as one JSON object. Arrays, scalars, and broken
/// JSON all fall back to plain-message treatment.
fn parse_json_object(line: &str) -> Option<Record> {
    if !line.starts_with('{') {
        return None;
    }
    // simd-json parses in place, so it gets its own copy of the line.
    let mut bytes = line.as_bytes().to_vec();
    simd_json::from_slice::<Map<String, Value>>(&mut bytes)
        .ok()
        .map(Record::from)
}

fn plain_record(line: &str) -> Record {
    let mut record = Record::from_message(line);
    if let Some(level) = sniff_level(line) {
        record.insert("level", level);
    }
    record
}

/// Best-effort severity detection for plain-text lines, keyed on the level
/// markers most formats print (`ERROR`, `[warn]`, `level=info`, ...).
fn sniff_level(line: &str) -> Option<&'static str> {
    let captures = level_pattern()?.captures(line)?;
    let marker = captures.get(1)?.as_str().to_ascii_uppercase();
    Some(match marker.as_str() {
        "FATAL" | "ERROR" => "error",
        "WARN" | "WARNING" => "warn",
        "INFO" => "info",
        "DEBUG" => "debug",
        _ => "trace",
    })
}
