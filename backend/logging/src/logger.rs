//! The logging facade.
//!
//! A [`Logger`] builds its routed engine once and then emits one record per
//! call. It never installs a global subscriber: every emission is scoped to the
//! logger's own [`Dispatch`].

use crate::config::LoggerConfig;
use crate::decompose::decompose;
use crate::error::Result;
use crate::options::{LogOption, LogOptions};
use crate::rolling::RollingFile;
use crate::router::build_engine;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

/// Fields of one record, in emission order after the header keys.
struct Fields<'a> {
    message: &'a str,
    caller: String,
    trace_id: Option<&'a str>,
    err_code: Option<i64>,
    app_name: &'a str,
    err_line: Option<&'a str>,
    err_stack: Option<String>,
}

impl<'a> Fields<'a> {
    fn new(
        message: &'a str,
        caller: &Location<'_>,
        options: &'a LogOptions,
        app_name: &'a str,
    ) -> Self {
        Self {
            message,
            caller: format!("{}:{}", caller.file(), caller.line()),
            trace_id: options.trace_id_field(),
            err_code: options.err_code_field(),
            app_name,
            err_line: None,
            err_stack: None,
        }
    }
}

macro_rules! emit {
    ($dispatch:expr, $level:expr, $fields:expr) => {{
        let fields = $fields;
        tracing::dispatcher::with_default($dispatch, || {
            tracing::event!(
                target: "mlog",
                $level,
                traceID = fields.trace_id,
                errcode = fields.err_code,
                app_name = fields.app_name,
                err_line = fields.err_line,
                err_stack = fields.err_stack.as_deref(),
                line = fields.caller.as_str(),
                "{}",
                fields.message
            )
        });
    }};
}

/// Structured logger routing info, warning and error records to separate sinks.
///
/// ```no_run
/// use mlog::{Logger, with_err_code, with_trace_id};
///
/// let log = Logger::new("orders", false);
/// log.m_info("order placed", &[with_trace_id("T1")]);
///
/// let err = std::io::Error::other("disk full");
/// log.m_error(Some(&err), &[with_err_code(507)]);
/// log.close().ok();
/// ```
pub struct Logger {
    name: String,
    debug: bool,
    dispatch: Dispatch,
    files: Vec<Arc<RollingFile>>,
}

impl Logger {
    /// Logger under `./logs` with the default rotation policy. Never fails;
    /// file problems only show up when records are written.
    pub fn new(name: impl Into<String>, debug: bool) -> Self {
        Self::from_config(LoggerConfig::new(name, debug))
    }

    pub fn from_config(config: LoggerConfig) -> Self {
        Self::with_console(config, std::io::stdout)
    }

    /// Like [`Logger::from_config`], writing debug-mode records to `console`
    /// instead of stdout.
    pub fn with_console<C>(config: LoggerConfig, console: C) -> Self
    where
        C: for<'a> MakeWriter<'a> + Clone + Send + Sync + 'static,
    {
        let engine = build_engine(&config, console);
        Self {
            name: config.name,
            debug: config.debug,
            dispatch: engine.dispatch,
            files: engine.files,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// The underlying engine, for code that wants to emit `tracing` events
    /// through the same routing.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Paths of the file sinks; empty in debug mode.
    pub fn log_files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(|f| f.path())
    }

    #[track_caller]
    pub fn m_info(&self, message: &str, options: &[LogOption]) {
        let options = LogOptions::apply(options);
        let fields = Fields::new(message, Location::caller(), &options, &self.name);
        emit!(&self.dispatch, tracing::Level::INFO, fields);
    }

    #[track_caller]
    pub fn m_warn(&self, message: &str, options: &[LogOption]) {
        let options = LogOptions::apply(options);
        let fields = Fields::new(message, Location::caller(), &options, &self.name);
        emit!(&self.dispatch, tracing::Level::WARN, fields);
    }

    /// Log `err` with its decomposed stack. `None` logs nothing.
    #[track_caller]
    pub fn m_error<E>(&self, err: Option<&E>, options: &[LogOption])
    where
        E: fmt::Debug + fmt::Display + ?Sized,
    {
        let Some(err) = err else {
            return;
        };
        let decomposition = decompose(err);
        let message = err.to_string();
        let options = LogOptions::apply(options);

        let mut fields = Fields::new(&message, Location::caller(), &options, &self.name);
        fields.err_line = Some(decomposition.cause_line.as_str());
        fields.err_stack = serde_json::to_string(&decomposition.lines).ok();
        emit!(&self.dispatch, tracing::Level::ERROR, fields);
    }

    /// Flush and release the file handles. Safe to call more than once; a
    /// later write reopens its file.
    ///
    /// Every file is closed even if one fails. The first error is returned,
    /// including backup pruning or compression failures since the last call.
    pub fn close(&self) -> Result<()> {
        self.files
            .iter()
            .map(|file| file.close())
            .fold(Ok(()), |first, next| first.and(next))
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("debug", &self.debug)
            .field("files", &self.files.iter().map(|f| f.path()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::{NO_STACK, REASON_MARKER};
    use crate::encoder::keys;
    use crate::encoder::test_support::CaptureWriter;
    use crate::options::{with_err_code, with_trace_id};
    use serde_json::Value;

    fn debug_logger(name: &str) -> (Logger, CaptureWriter) {
        let console = CaptureWriter::default();
        let logger = Logger::with_console(LoggerConfig::new(name, true), console.clone());
        (logger, console)
    }

    /// Debug output whose detailed form spans several lines.
    struct Traced;

    impl fmt::Display for Traced {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("query timed out")
        }
    }

    impl fmt::Debug for Traced {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("query timed out\nrepo.find\n\tsrc/repo.rs:88\nsvc.handle\n\tsrc/svc.rs:12")
        }
    }

    #[test]
    fn info_record_carries_app_name_and_caller() {
        let (log, console) = debug_logger("orders");
        log.m_info("order placed", &[]);

        let records = console.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r[keys::LEVEL], "info");
        assert_eq!(r[keys::MESSAGE], "order placed");
        assert_eq!(r[keys::APP_NAME], "orders");
        assert_eq!(r[keys::LOGGER], "orders");
        assert!(r[keys::CALLER].as_str().unwrap().contains("logger.rs:"));
        assert!(r.get(keys::TRACE_ID).is_none());
        assert!(r.get(keys::ERR_CODE).is_none());
        assert!(r.get(keys::ERR_LINE).is_none());
        assert!(r.get(keys::ERR_STACK).is_none());
    }

    #[test]
    fn options_become_fields_ahead_of_app_name() {
        let (log, console) = debug_logger("orders");
        log.m_info("paid", &[with_trace_id("T1"), with_err_code(7)]);

        let line = console.output();
        let trace = line.find("\"traceID\"").unwrap();
        let code = line.find("\"errcode\"").unwrap();
        let app = line.find("\"app_name\"").unwrap();
        assert!(trace < code && code < app, "{line}");

        let r = &console.records()[0];
        assert_eq!(r[keys::TRACE_ID], "T1");
        assert_eq!(r[keys::ERR_CODE], 7);
    }

    #[test]
    fn zero_error_code_is_omitted() {
        let (log, console) = debug_logger("orders");
        log.m_warn("retrying", &[with_err_code(0)]);

        let r = &console.records()[0];
        assert_eq!(r[keys::LEVEL], "warn");
        assert!(r.get(keys::ERR_CODE).is_none());
    }

    #[test]
    fn none_error_emits_nothing() {
        let (log, console) = debug_logger("orders");
        log.m_error(None::<&std::io::Error>, &[with_trace_id("T1")]);
        assert!(console.output().is_empty());
    }

    #[test]
    fn short_error_uses_sentinel_cause() {
        let (log, console) = debug_logger("orders");
        let err = std::io::Error::other("disk full");
        log.m_error(Some(&err), &[]);

        let records = console.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r[keys::LEVEL], "error");
        assert_eq!(r[keys::MESSAGE], "disk full");
        assert_eq!(r[keys::ERR_LINE], NO_STACK);
        let stack = r[keys::ERR_STACK].as_array().unwrap();
        let first = stack[0].as_str().unwrap();
        assert!(first.starts_with(REASON_MARKER));
        assert!(first.contains("disk full"));
    }

    #[test]
    fn long_error_takes_third_line_as_cause() {
        let (log, console) = debug_logger("orders");
        log.m_error(Some(&Traced), &[with_err_code(504)]);

        let r = &console.records()[0];
        assert_eq!(r[keys::MESSAGE], "query timed out");
        assert_eq!(r[keys::ERR_LINE], "\tsrc/repo.rs:88");
        assert_eq!(r[keys::ERR_CODE], 504);
        let stack: Vec<&str> = r[keys::ERR_STACK]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(stack.len(), 5);
        assert_eq!(stack[0], format!("{REASON_MARKER}query timed out"));
        assert_eq!(stack[2], "\tsrc/repo.rs:88");
    }

    #[test]
    fn error_fields_follow_app_name() {
        let (log, console) = debug_logger("orders");
        log.m_error(Some(&Traced), &[with_trace_id("T9")]);

        let line = console.output();
        let order: Vec<usize> = ["\"traceID\"", "\"app_name\"", "\"err_line\"", "\"err_stack\""]
            .iter()
            .map(|k| line.find(k).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{line}");
    }

    #[test]
    fn debug_level_through_dispatch_is_dropped() {
        let (log, console) = debug_logger("orders");
        tracing::dispatcher::with_default(log.dispatch(), || {
            tracing::debug!("hidden");
            tracing::info!("visible");
        });
        let records = console.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0][keys::MESSAGE], Value::from("visible"));
    }

    #[test]
    fn close_is_idempotent() {
        let (log, _console) = debug_logger("orders");
        assert!(log.close().is_ok());
        assert!(log.close().is_ok());
        assert!(log.log_files().next().is_none());
        assert!(log.is_debug());
        assert_eq!(log.name(), "orders");
    }
}
