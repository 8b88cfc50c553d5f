//! Logger configuration: facade identity, log root, and the rotation policy
//! applied to every file sink.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root directory under which the per-day directories are created.
pub const DEFAULT_LOG_ROOT: &str = "./logs";

/// Size threshold applied when a policy carries `max_size_mb == 0`.
pub const DEFAULT_MAX_SIZE_MB: u64 = 128;

const MEGABYTE: u64 = 1024 * 1024;

/// Rotation thresholds for one physical log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotationPolicy {
    /// Size in megabytes a file may reach before it is rotated.
    pub max_size_mb: u64,
    /// Number of rotated backups to keep. `0` keeps all of them.
    pub max_backups: usize,
    /// Days a rotated backup is kept. `0` disables age-based removal.
    pub max_age_days: u64,
    /// Gzip rotated backups. Compression runs on the thread whose write
    /// triggered the rotation, after the file lock is released: that caller
    /// waits for it, other writers of the same file do not.
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_backups: 30,
            max_age_days: 7,
            compress: true,
        }
    }
}

impl RotationPolicy {
    /// Size threshold in bytes.
    pub fn max_bytes(&self) -> u64 {
        let mb = if self.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size_mb
        };
        mb.saturating_mul(MEGABYTE)
    }

    /// Maximum backup age, if age-based removal is enabled.
    pub fn max_age(&self) -> Option<chrono::Duration> {
        if self.max_age_days == 0 {
            return None;
        }
        i64::try_from(self.max_age_days)
            .ok()
            .and_then(chrono::Duration::try_days)
    }
}

/// Spelling of the warning stream's file suffix.
///
/// Deployments before this crate wrote warnings to `<name>_waring.log`, and
/// log collectors were configured against that name, so it stays the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningStreamName {
    #[default]
    Legacy,
    Corrected,
}

impl WarningStreamName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "waring",
            Self::Corrected => "warning",
        }
    }
}

/// Everything needed to build a [`crate::Logger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Application/component name; prefixes every log file and fills `app_name`.
    pub name: String,
    /// Route every severity to the console instead of files.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,
    #[serde(default)]
    pub rotation: RotationPolicy,
    #[serde(default)]
    pub warning_stream: WarningStreamName,
}

fn default_log_root() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_ROOT)
}

impl LoggerConfig {
    pub fn new(name: impl Into<String>, debug: bool) -> Self {
        Self {
            name: name.into(),
            debug,
            log_root: default_log_root(),
            rotation: RotationPolicy::default(),
            warning_stream: WarningStreamName::default(),
        }
    }

    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = log_root.into();
        self
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_warning_stream(mut self, warning_stream: WarningStreamName) -> Self {
        self.warning_stream = warning_stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_deployed_thresholds() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.max_size_mb, 128);
        assert_eq!(policy.max_backups, 30);
        assert_eq!(policy.max_age_days, 7);
        assert!(policy.compress);
        assert_eq!(policy.max_bytes(), 128 * 1024 * 1024);
        assert_eq!(policy.max_age(), chrono::Duration::try_days(7));
    }

    #[test]
    fn zero_thresholds_fall_back() {
        let policy = RotationPolicy {
            max_size_mb: 0,
            max_age_days: 0,
            ..Default::default()
        };
        assert_eq!(policy.max_bytes(), DEFAULT_MAX_SIZE_MB * 1024 * 1024);
        assert!(policy.max_age().is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: LoggerConfig = serde_json::from_str(r#"{"name":"orders"}"#).unwrap();
        assert_eq!(cfg, LoggerConfig::new("orders", false));
        assert_eq!(cfg.log_root, PathBuf::from("./logs"));
        assert_eq!(cfg.warning_stream.as_str(), "waring");
    }

    #[test]
    fn deserializes_overrides() {
        let raw = r#"{
            "name": "billing",
            "debug": true,
            "logRoot": "/var/log/billing",
            "rotation": { "maxSizeMb": 16, "compress": false },
            "warningStream": "corrected"
        }"#;
        let cfg: LoggerConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.log_root, PathBuf::from("/var/log/billing"));
        assert_eq!(cfg.rotation.max_size_mb, 16);
        assert_eq!(cfg.rotation.max_backups, 30);
        assert!(!cfg.rotation.compress);
        assert_eq!(cfg.warning_stream.as_str(), "warning");
    }
}
