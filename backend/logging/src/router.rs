//! Severity routing and engine construction.
//!
//! Each tracked severity gets its own core: a [`JsonLayer`] behind a filter
//! that admits that level *exactly*. The three cores share one registry, so a
//! single event reaches at most one sink. Levels outside the three tracked ones
//! match no filter and are dropped.

use crate::config::LoggerConfig;
use crate::encoder::JsonLayer;
use crate::rolling::RollingFile;
use crate::sink::DateNamedSink;
use std::sync::Arc;
use tracing::{Dispatch, Level, Metadata};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{FilterFn, filter_fn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;

type Core = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// A routed severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Error];

    pub fn level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }

    /// Stream name used in the file name; see [`crate::WarningStreamName`].
    pub fn stream_name(self, config: &LoggerConfig) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => config.warning_stream.as_str(),
            Self::Error => "error",
        }
    }

    /// `<name>_<stream>.log`
    pub fn file_name(self, config: &LoggerConfig) -> String {
        format!("{}_{}.log", config.name, self.stream_name(config))
    }

    pub fn matches(self, level: &Level) -> bool {
        *level == self.level()
    }
}

/// Filter admitting only events of exactly `severity`.
pub fn exact_level(severity: Severity) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
    filter_fn(move |meta| severity.matches(meta.level()))
}

/// The built fan-out engine and the file writers it owns.
pub(crate) struct Engine {
    pub(crate) dispatch: Dispatch,
    pub(crate) files: Vec<Arc<RollingFile>>,
}

/// Build the three routed cores and merge them into one [`Dispatch`].
///
/// In debug mode every core writes to `console`; otherwise each severity gets a
/// rotating file under today's directory.
pub(crate) fn build_engine<C>(config: &LoggerConfig, console: C) -> Engine
where
    C: for<'a> MakeWriter<'a> + Clone + Send + Sync + 'static,
{
    let logger_name: Arc<str> = Arc::from(config.name.as_str());
    let mut files = Vec::new();
    let mut cores: Vec<Core> = Vec::with_capacity(Severity::ALL.len());

    for severity in Severity::ALL {
        let writer = if config.debug {
            BoxMakeWriter::new(console.clone())
        } else {
            let sink = DateNamedSink::new(&config.log_root, severity.file_name(config));
            let file = sink.open(config.rotation);
            files.push(Arc::clone(&file));
            BoxMakeWriter::new(file)
        };
        cores.push(routed_core(Arc::clone(&logger_name), writer, severity));
    }

    Engine {
        dispatch: Dispatch::new(tracing_subscriber::registry().with(cores)),
        files,
    }
}

fn routed_core(logger_name: Arc<str>, writer: BoxMakeWriter, severity: Severity) -> Core {
    JsonLayer::new(logger_name, writer)
        .with_filter(exact_level(severity))
        .boxed()
}
