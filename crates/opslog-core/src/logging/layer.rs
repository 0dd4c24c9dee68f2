//! Tracing Layer that writes JSON lines and routes errors through a
//! [`StackTraceProcessor`].
//!
//! Any event that records an error value (`error = &err as &dyn Error`) has
//! that error captured as a [`Failure`] and processed; the resulting text lands
//! in the entry's `stacktrace` field. With an archiving processor the line
//! carries only `<message> (<locator>)`.

use std::fmt::Write as FmtWrite;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::entry::LogEntry;
use crate::failure::Failure;
use crate::processor::StackTraceProcessor;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A tracing Layer emitting one JSON line per event.
pub struct FailureLayer {
    processor: StackTraceProcessor,
    writer: SharedWriter,
    capture_frames: bool,
}

impl FailureLayer {
    /// Layer writing to an arbitrary sink.
    pub fn new(processor: StackTraceProcessor, writer: impl Write + Send + 'static) -> Self {
        Self {
            processor,
            writer: Arc::new(Mutex::new(Box::new(writer))),
            capture_frames: false,
        }
    }

    /// Layer appending to a log file, creating parent directories as needed.
    pub fn to_file(processor: StackTraceProcessor, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(processor, file))
    }

    /// Attach the logging call's stack frames to captured failures.
    ///
    /// Distinct call sites then archive separately.
    pub fn with_frames(mut self, capture: bool) -> Self {
        self.capture_frames = capture;
        self
    }

    /// Processor applied to recorded errors.
    pub fn processor(&self) -> &StackTraceProcessor {
        &self.processor
    }

    fn emit(&self, entry: &LogEntry) -> std::io::Result<()> {
        let json = entry
            .to_json_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}

impl<S> Layer<S> for FailureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level().as_str().to_lowercase();

        let mut visitor = EntryVisitor::new();
        event.record(&mut visitor);

        let mut entry = LogEntry::new(level, metadata.target(), visitor.message.unwrap_or_default());

        if let Some(mut failure) = visitor.failure {
            if self.capture_frames {
                failure = failure.capture_frames();
            }
            let mut text = String::new();
            match self.processor.process(&failure, &mut text) {
                Ok(()) => entry = entry.with_stacktrace(text),
                // recorded, not re-logged
                Err(e) => {
                    visitor.fields.insert(
                        "stacktrace_error".to_string(),
                        serde_json::Value::String(e.to_string()),
                    );
                }
            }
        }

        if !visitor.fields.is_empty() {
            entry = entry.with_fields(serde_json::Value::Object(visitor.fields));
        }

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // Errors writing the log itself have nowhere to go
        let _ = self.emit(&entry);
    }
}

/// Collects message, fields and the first recorded error of an event.
struct EntryVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
    failure: Option<Failure>,
}

impl EntryVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: serde_json::Map::new(),
            failure: None,
        }
    }

    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for EntryVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);

        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, serde_json::Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, serde_json::Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, serde_json::Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, serde_json::Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, serde_json::Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.failure.is_none() {
            self.failure = Some(Failure::from_dyn_error(value));
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }
}
