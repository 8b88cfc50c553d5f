//! Per-call contextual fields: trace identifier and error code.
//!
//! ```
//! use mlog::{LogOptions, with_err_code, with_trace_id};
//!
//! let opts = LogOptions::apply(&[with_trace_id("T1"), with_err_code(7)]);
//! assert_eq!(opts.trace_id_field(), Some("T1"));
//! assert_eq!(opts.err_code_field(), Some(7));
//! ```

/// One optional field attached to a single log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOption {
    TraceId(String),
    ErrCode(i64),
}

pub fn with_trace_id(trace_id: impl Into<String>) -> LogOption {
    LogOption::TraceId(trace_id.into())
}

pub fn with_err_code(err_code: i64) -> LogOption {
    LogOption::ErrCode(err_code)
}

/// Resolved options for one call.
///
/// Empty/zero values mean "not set": an error code of `0` is never emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    trace_id: String,
    err_code: i64,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `options` over a zeroed instance in order; the last option of a kind wins.
    pub fn apply(options: &[LogOption]) -> Self {
        options.iter().fold(Self::new(), Self::with)
    }

    pub fn with(self, option: &LogOption) -> Self {
        match option {
            LogOption::TraceId(trace_id) => self.trace_id(trace_id.clone()),
            LogOption::ErrCode(err_code) => self.err_code(*err_code),
        }
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn err_code(mut self, err_code: i64) -> Self {
        self.err_code = err_code;
        self
    }

    /// `traceID` value, present only when non-empty.
    pub fn trace_id_field(&self) -> Option<&str> {
        (!self.trace_id.is_empty()).then_some(self.trace_id.as_str())
    }

    /// `errcode` value, present only when non-zero.
    pub fn err_code_field(&self) -> Option<i64> {
        (self.err_code != 0).then_some(self.err_code)
    }
}

impl<'a> FromIterator<&'a LogOption> for LogOptions {
    fn from_iter<I: IntoIterator<Item = &'a LogOption>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}
