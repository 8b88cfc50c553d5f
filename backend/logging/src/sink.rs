//! Day-stamped file destinations: `<log_root>/<YYYYMMDD>/<file_name>`.

use crate::config::RotationPolicy;
use crate::rolling::RollingFile;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DAY_DIR_FORMAT: &str = "%Y%m%d";

/// Resolves a log file name into a path under the day directory.
///
/// The day is fixed when the sink is built. A process that keeps running past
/// local midnight keeps writing into the directory of the day it started in
/// until its logger is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNamedSink {
    base: PathBuf,
    file_name: String,
}

impl DateNamedSink {
    /// Sink under today's (local time) directory.
    pub fn new(log_root: &Path, file_name: impl Into<String>) -> Self {
        Self::for_date(log_root, Local::now().date_naive(), file_name)
    }

    pub fn for_date(log_root: &Path, date: NaiveDate, file_name: impl Into<String>) -> Self {
        Self {
            base: log_root.join(day_dir_name(date)),
            file_name: file_name.into(),
        }
    }

    /// The day directory this sink writes into.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path(&self) -> PathBuf {
        self.base.join(&self.file_name)
    }

    /// Build the rotating writer bound to [`Self::path`]. Creates nothing on disk.
    pub fn open(&self, policy: RotationPolicy) -> Arc<RollingFile> {
        Arc::new(RollingFile::new(self.path(), policy))
    }
}

/// `YYYYMMDD` directory name for a day.
pub fn day_dir_name(date: NaiveDate) -> String {
    date.format(DAY_DIR_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_rooted_in_day_directory() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let sink = DateNamedSink::for_date(Path::new("./logs"), date, "orders_info.log");
        assert_eq!(sink.base(), Path::new("./logs/20260307"));
        assert_eq!(sink.path(), PathBuf::from("./logs/20260307/orders_info.log"));
    }

    #[test]
    fn today_is_resolved_at_construction() {
        let before = day_dir_name(Local::now().date_naive());
        let sink = DateNamedSink::new(Path::new("logs"), "a_error.log");
        let after = day_dir_name(Local::now().date_naive());
        let dir = sink.base().file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir == before || dir == after, "unexpected day dir {dir}");
        assert_eq!(dir.len(), 8);
    }

    #[test]
    fn open_binds_writer_to_path_without_touching_disk() {
        let root = std::env::temp_dir().join(format!("mlog-sink-{}", uuid::Uuid::new_v4()));
        let sink = DateNamedSink::new(&root, "svc_info.log");
        let policy = RotationPolicy::default();
        let file = sink.open(policy);
        assert_eq!(file.path(), sink.path());
        assert_eq!(file.policy(), policy);
        assert!(!root.exists());
    }
}
