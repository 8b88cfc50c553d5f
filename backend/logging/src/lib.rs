//! Structured logging facade with exact-level routing.
//!
//! Info, warning and error records each go to their own sink: stdout in debug
//! mode, otherwise a size-rotated file under `<log_root>/<YYYYMMDD>/`. Records
//! are JSON lines carrying optional per-call fields (trace ID, error code) and,
//! for errors, the decomposed error rendering.

pub mod config;
pub mod decompose;
pub mod encoder;
pub mod error;
pub mod logger;
pub mod options;
pub mod rolling;
pub mod router;
pub mod sink;

pub use config::{LoggerConfig, RotationPolicy, WarningStreamName};
pub use decompose::{ErrorDecomposition, decompose};
pub use encoder::{JsonLayer, keys};
pub use error::{Error, Result};
pub use logger::Logger;
pub use options::{LogOption, LogOptions, with_err_code, with_trace_id};
pub use rolling::RollingFile;
pub use router::Severity;
pub use sink::DateNamedSink;
