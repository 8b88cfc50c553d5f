//! Size-rotated log file.
//!
//! A [`RollingFile`] appends to one path. When a write would push the file past
//! [`RotationPolicy::max_bytes`], the file is renamed to a timestamped backup
//! next to it and a fresh file is started. After each rotation the backups are
//! pruned by count and age and, if enabled, gzipped.
//!
//! Backups are named `<stem>-<UTC YYYY-MM-DDTHH-MM-SS.mmm>[-<n>].<ext>[.gz]`,
//! where `-<n>` only appears when an earlier backup already took the name.

use crate::config::RotationPolicy;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";

#[derive(Debug)]
struct ActiveFile {
    file: File,
    size: u64,
}

/// A log file that rotates itself under a [`RotationPolicy`].
///
/// Writes take an internal lock for their whole duration, so one `write_all`
/// per record never interleaves with another thread's record and rotations
/// never race. Retention runs after that lock is released, serialized on a
/// lock of its own; its last failure is kept and returned by
/// [`RollingFile::close`].
#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    policy: RotationPolicy,
    active: Mutex<Option<ActiveFile>>,
    retention: Mutex<Option<Error>>,
}

impl RollingFile {
    /// Nothing touches the filesystem until the first write.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            active: Mutex::new(None),
            retention: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Append one record, rotating first if it would overflow the file.
    pub fn write_record(&self, buf: &[u8]) -> Result<()> {
        let len = buf.len() as u64;
        let max = self.policy.max_bytes();
        if len > max {
            return Err(Error::RecordTooLarge { len, max });
        }

        let mut guard = self.lock()?;
        let (active, rotated) = match guard.take() {
            Some(active) if active.size + len <= max => (active, false),
            Some(active) => {
                drop(active);
                (self.rotate()?, true)
            }
            None => self.open_existing_or_new(len)?,
        };
        let active = guard.insert(active);
        let written = active.file.write_all(buf);
        if written.is_ok() {
            active.size += len;
        }
        drop(guard);

        if rotated {
            self.run_retention();
        }
        written.map_err(Error::from)
    }

    /// Force a rotation regardless of the current size.
    pub fn rotate_now(&self) -> Result<()> {
        let mut guard = self.lock()?;
        guard.take();
        *guard = Some(self.rotate()?);
        drop(guard);

        self.run_retention();
        Ok(())
    }

    /// Flush and release the file handle. The next write reopens the file.
    ///
    /// Also returns, once, the last retention failure since the previous call.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(mut active) = guard.take() {
            active.file.flush()?;
        }
        drop(guard);

        match self.retention_state().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<ActiveFile>>> {
        self.active
            .lock()
            .map_err(|_| Error::Poisoned(self.path.clone()))
    }

    fn retention_state(&self) -> MutexGuard<'_, Option<Error>> {
        self.retention.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the file and whether opening it rotated an existing one.
    fn open_existing_or_new(&self, write_len: u64) -> Result<(ActiveFile, bool)> {
        self.ensure_dir()?;
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((self.open_new()?, false)),
            Err(e) => return Err(e.into()),
        };
        if size + write_len >= self.policy.max_bytes() {
            return Ok((self.rotate()?, true));
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        Ok((ActiveFile { file, size }, false))
    }

    fn open_new(&self) -> Result<ActiveFile> {
        self.ensure_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(ActiveFile { file, size: 0 })
    }

    fn ensure_dir(&self) -> Result<()> {
        let Some(dir) = self.dir() else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|source| Error::CreateDirectory {
            path: dir.to_path_buf(),
            source,
        })
    }

    /// Move the current file aside and start a fresh one. Caller holds the
    /// write lock.
    fn rotate(&self) -> Result<ActiveFile> {
        if self.path.exists() {
            let backup = self.backup_path(Utc::now());
            fs::rename(&self.path, &backup)?;
            debug!(from = %self.path.display(), to = %backup.display(), "Rotated log file");
        }
        self.open_new()
    }

    fn run_retention(&self) {
        let mut pending = self.retention_state();
        if let Err(e) = self.mill() {
            warn!(path = %self.path.display(), error = %e, "Failed to prune log backups");
            *pending = Some(e);
        }
    }

    fn dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn sibling(&self, name: String) -> PathBuf {
        match self.dir() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// `(prefix, extension)` shared by every backup name of this file.
    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (format!("{stem}-"), ext)
    }

    /// First backup name for `at` not already taken, compressed or not.
    fn backup_path(&self, at: DateTime<Utc>) -> PathBuf {
        let (prefix, ext) = self.name_parts();
        let stamp = at.format(BACKUP_TIME_FORMAT).to_string();
        let mut seq = 0u32;
        loop {
            let name = match seq {
                0 => format!("{prefix}{stamp}{ext}"),
                n => format!("{prefix}{stamp}-{n}{ext}"),
            };
            let path = self.sibling(name);
            if !path.exists() && !compressed_path(&path).exists() {
                return path;
            }
            seq += 1;
        }
    }

    /// Backups of this file, newest first.
    fn backups(&self) -> Result<Vec<Backup>> {
        let (prefix, ext) = self.name_parts();
        let dir = self.dir().unwrap_or_else(|| Path::new("."));

        let mut backups = Vec::new();
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else {
                continue;
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(backup) = Backup::parse(entry.path(), &name, &prefix, &ext) {
                backups.push(backup);
            }
        }
        backups.sort_by(|a, b| (b.timestamp, b.seq).cmp(&(a.timestamp, a.seq)));
        Ok(backups)
    }

    /// Apply the retention and compression rules to the existing backups.
    /// Keeps going past individual failures and returns the first one.
    fn mill(&self) -> Result<()> {
        let mut backups = self.backups()?;
        let mut stale = Vec::new();

        if self.policy.max_backups > 0 && backups.len() > self.policy.max_backups {
            stale.extend(backups.split_off(self.policy.max_backups));
        }

        if let Some(max_age) = self.policy.max_age() {
            let cutoff = Utc::now().naive_utc() - max_age;
            let (keep, expired): (Vec<_>, Vec<_>) =
                backups.into_iter().partition(|b| b.timestamp >= cutoff);
            stale.extend(expired);
            backups = keep;
        }

        let mut result = Ok(());
        for backup in stale {
            result = result.and(backup.remove());
        }
        if self.policy.compress {
            for backup in backups.iter().filter(|b| !b.compressed) {
                result = result.and(compress(&backup.path));
            }
        }
        result
    }
}

impl Write for &RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.lock()?;
        if let Some(active) = guard.as_mut() {
            active.file.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Backup {
    path: PathBuf,
    timestamp: NaiveDateTime,
    seq: u32,
    compressed: bool,
}

impl Backup {
    fn parse(path: PathBuf, name: &str, prefix: &str, ext: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?;
        let (rest, compressed) = match rest.strip_suffix(COMPRESS_SUFFIX) {
            Some(rest) => (rest, true),
            None => (rest, false),
        };
        let stamp = rest.strip_suffix(ext)?;
        let (timestamp, seq) = match NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) {
            Ok(timestamp) => (timestamp, 0),
            Err(_) => {
                let (stamp, seq) = stamp.rsplit_once('-')?;
                let timestamp = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;
                (timestamp, seq.parse().ok()?)
            }
        };
        Some(Self {
            path,
            timestamp,
            seq,
            compressed,
        })
    }

    fn remove(&self) -> Result<()> {
        debug!(path = %self.path.display(), "Removing log backup");
        fs::remove_file(&self.path).map_err(|source| Error::RemoveBackup {
            path: self.path.clone(),
            source,
        })
    }
}

fn compressed_path(path: &Path) -> PathBuf {
    let mut target = OsString::from(path.as_os_str());
    target.push(COMPRESS_SUFFIX);
    PathBuf::from(target)
}

fn compress(path: &Path) -> Result<()> {
    let wrap = |source: io::Error| Error::Compress {
        path: path.to_path_buf(),
        source,
    };

    let mut src = File::open(path).map_err(wrap)?;
    let dst = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(compressed_path(path))
        .map_err(wrap)?;
    let mut encoder = GzEncoder::new(dst, Compression::default());
    io::copy(&mut src, &mut encoder).map_err(wrap)?;
    encoder.finish().map_err(wrap)?;
    fs::remove_file(path).map_err(wrap)?;
    Ok(())
}
