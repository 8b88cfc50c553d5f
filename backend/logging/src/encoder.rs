//! JSON encoder layer: renders each event as one compact JSON object per line.
//!
//! Header keys come first in a fixed order (`time`, `level`, `logger`, `line`,
//! `msg`), followed by the event's remaining fields in declaration order.
//! Fields recorded as `None` are absent from the output. A field whose name
//! matches a header key is written as `fields.<name>` instead.

use serde::Serializer;
use serde::ser::SerializeMap;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};

/// Record keys.
pub mod keys {
    pub const TIME: &str = "time";
    pub const LEVEL: &str = "level";
    pub const LOGGER: &str = "logger";
    pub const CALLER: &str = "line";
    pub const MESSAGE: &str = "msg";

    pub const TRACE_ID: &str = "traceID";
    pub const ERR_CODE: &str = "errcode";
    pub const APP_NAME: &str = "app_name";
    pub const ERR_LINE: &str = "err_line";
    pub const ERR_STACK: &str = "err_stack";

    /// Prefix for event fields that would shadow a header key.
    pub const SHADOWED_PREFIX: &str = "fields.";

    /// Name `tracing` gives the formatted message of an event.
    pub(crate) const TRACING_MESSAGE: &str = "message";

    pub(crate) const HEADER: [&str; 5] = [TIME, LEVEL, LOGGER, CALLER, MESSAGE];
}

/// ISO-8601, millisecond precision, numeric offset.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// A [`Layer`] that writes JSON lines to `W`.
pub struct JsonLayer<W> {
    logger_name: Arc<str>,
    make_writer: W,
}

impl<W> JsonLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(logger_name: Arc<str>, make_writer: W) -> Self {
        Self {
            logger_name,
            make_writer,
        }
    }

    fn encode(&self, event: &Event<'_>) -> serde_json::Result<Vec<u8>> {
        let meta = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = visitor.caller.take().unwrap_or_else(|| {
            format!(
                "{}:{}",
                meta.file().unwrap_or("<unknown>"),
                meta.line().unwrap_or_default()
            )
        });
        let time = chrono::Local::now().format(TIME_FORMAT).to_string();

        let mut buf = Vec::with_capacity(256);
        let mut serializer = serde_json::Serializer::new(&mut buf);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(keys::TIME, &time)?;
        map.serialize_entry(keys::LEVEL, level_name(meta.level()))?;
        map.serialize_entry(keys::LOGGER, &*self.logger_name)?;
        map.serialize_entry(keys::CALLER, &caller)?;
        map.serialize_entry(keys::MESSAGE, visitor.message.as_deref().unwrap_or_default())?;
        for (key, value) in &visitor.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()?;

        buf.push(b'\n');
        Ok(buf)
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Ok(line) = self.encode(event) else {
            return;
        };
        let mut writer = self.make_writer.make_writer_for(event.metadata());
        // Single write per record; the writer serializes concurrent callers.
        let _ = writer.write_all(&line);
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        _ => "trace",
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    caller: Option<String>,
    fields: Vec<(Cow<'static, str>, Value)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        let name = field.name();
        let key = if keys::HEADER.contains(&name) {
            Cow::Owned(format!("{}{name}", keys::SHADOWED_PREFIX))
        } else {
            Cow::Borrowed(name)
        };
        self.fields.push((key, value));
    }

    fn push_text(&mut self, field: &Field, text: String) {
        match field.name() {
            keys::TRACING_MESSAGE => self.message = Some(text),
            keys::CALLER => self.caller = Some(text),
            // Carried through `tracing` as JSON text so it lands as an array.
            keys::ERR_STACK => {
                let value = match serde_json::from_str(&text) {
                    Ok(lines @ Value::Array(_)) => lines,
                    _ => Value::String(text),
                };
                self.push(field, value);
            }
            _ => self.push(field, Value::String(text)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push_text(field, value.to_owned());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.push(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push_text(field, format!("{value:?}"));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory writer that captures everything written to it.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        pub(crate) fn output(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
        }

        pub(crate) fn records(&self) -> Vec<serde_json::Value> {
            self.output()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer
                .lock()
                .map_err(|_| io::Error::other("Mutex poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
