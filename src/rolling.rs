//! A size-triggered rolling file appender with timestamped backups.
//!
//! Records are appended to a single active log file. Once the file reaches
//! the configured size, it is renamed to `<file>.<timestamp>` (for example
//! `app.log.20240115T120000Z`), optionally compressed, and a fresh active
//! file is opened. Older backups are then pruned by count and by age.
//!
//! Several processes may append to the same log file. Rotation is
//! coordinated through a sibling lock file (`.<file>.lock`) holding an
//! exclusive advisory lock: exactly one process performs the rename while
//! the others pick up the freshly rotated file before writing.
//!
//! Backups left behind by an older index-based rotation scheme (`app.log.1`,
//! `app.log.2`, ...) are renamed to timestamp form, using each file's mtime,
//! the first time the directory is scanned.
//!
//! # Examples
//!
//! ```rust
//! # fn docs() {
//! use timestamped_appender::rolling::TimestampedRollingAppender;
//! let file_appender = TimestampedRollingAppender::builder()
//!     .max_file_size(10 * 1024 * 1024)
//!     .max_backup_count(Some(5))
//!     .build("/some/directory/app.log")
//!     .expect("initializing rolling file appender failed");
//! # drop(file_appender);
//! # }
//! ```
use crate::sync::{RwLock, RwLockReadGuard};
use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use fs2::FileExt;
use time::OffsetDateTime;

mod builder;
mod compress;
pub(crate) mod retention;
pub(crate) mod suffix;
pub(crate) mod timestamp;

pub use builder::{
    Builder, InitError, DEFAULT_MAX_BACKUP_COUNT, DEFAULT_MAX_BACKUP_DAYS, DEFAULT_MAX_FILE_SIZE,
};
pub use compress::Compress;
#[cfg(feature = "gzip")]
pub use compress::GzipCompress;

use retention::{Backup, RetentionPolicy};
use suffix::Suffix;

/// A file appender that rotates the log file when it reaches a maximum size,
/// naming each rotated-out file with the instant of rotation.
///
/// `TimestampedRollingAppender` implements the [`std::io::Write` trait][write]
/// and will block on write operations. It may be used with
/// [`NonBlocking`] to perform writes without blocking the current thread.
///
/// Additionally, it implements the [`MakeWriter`] trait from
/// `tracing-subscriber`, so it may also be used directly, without
/// [`NonBlocking`].
///
/// [write]: std::io::Write
/// [`NonBlocking`]: super::non_blocking::NonBlocking
/// [`MakeWriter`]: tracing_subscriber::fmt::writer::MakeWriter
///
/// # Examples
///
/// ```rust
/// # fn docs() {
/// let file_appender = timestamped_appender::rolling::max_size("/some/directory/app.log", 100_000_000);
/// # }
/// ```
pub struct TimestampedRollingAppender {
    state: Inner,
    writer: RwLock<File>,
    #[cfg(test)]
    now: Box<dyn Fn() -> i64 + Send + Sync>,
}

/// A [writer] that writes to the appender's active log file.
///
/// This is returned by the [`MakeWriter`] implementation for
/// [`TimestampedRollingAppender`].
///
/// [writer]: std::io::Write
/// [`MakeWriter`]: tracing_subscriber::fmt::writer::MakeWriter
#[derive(Debug)]
pub struct RollingWriter<'a> {
    inner: RwLockReadGuard<'a, File>,
}

struct Inner {
    name: String,
    base_path: PathBuf,
    log_directory: String,
    base_name: String,
    lock_path: PathBuf,
    max_file_size: u64,
    retention: RetentionPolicy,
    compress: Option<Box<dyn Compress>>,
    append: bool,
    mode: u32,
}

// === impl TimestampedRollingAppender ===

impl TimestampedRollingAppender {
    /// Creates a new `TimestampedRollingAppender` writing to `path` and
    /// rotating at `max_file_size` bytes, with the default retention
    /// settings.
    ///
    /// Additional parameters can be configured using
    /// [`TimestampedRollingAppender::builder`].
    ///
    /// # Panics
    ///
    /// Panics if the appender cannot be initialized. Use the [builder]
    /// interface to handle initialization errors gracefully.
    ///
    /// [builder]: TimestampedRollingAppender::builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// # fn docs() {
    /// use timestamped_appender::rolling::TimestampedRollingAppender;
    /// let file_appender = TimestampedRollingAppender::new("/some/directory/app.log", 10_000_000);
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>, max_file_size: u64) -> TimestampedRollingAppender {
        Self::builder()
            .max_file_size(max_file_size)
            .build(path)
            .expect("initializing timestamped rolling appender failed")
    }

    /// Returns a new [`Builder`] for configuring a
    /// `TimestampedRollingAppender`.
    ///
    /// Unlike [`TimestampedRollingAppender::new`], the [`Builder::build`]
    /// method returns a `Result` rather than panicking when the appender
    /// cannot be initialized.
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// The logical name this appender was given at construction.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub(crate) fn from_builder(
        builder: Builder,
        path: impl AsRef<Path>,
    ) -> Result<Self, InitError> {
        Self::impl_from_builder(
            builder,
            path,
            #[cfg(test)]
            Box::new(|| OffsetDateTime::now_utc().unix_timestamp()),
        )
    }

    #[cfg(test)]
    pub(crate) fn from_builder_with_custom_now(
        builder: Builder,
        path: impl AsRef<Path>,
        now: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Result<Self, InitError> {
        Self::impl_from_builder(builder, path, now)
    }

    fn impl_from_builder(
        builder: Builder,
        path: impl AsRef<Path>,
        #[cfg(test)] now: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Result<Self, InitError> {
        let (state, writer) = Inner::new(builder, path.as_ref())?;
        Ok(Self {
            state,
            writer,
            #[cfg(test)]
            now,
        })
    }

    #[inline]
    fn now(&self) -> i64 {
        #[cfg(test)]
        return (self.now)();

        #[cfg(not(test))]
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

impl io::Write for TimestampedRollingAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let now = self.now();
        let writer = self.writer.get_mut();
        self.state.rollover_if_needed(writer, now);
        writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.get_mut().flush()
    }
}

impl<'a> tracing_subscriber::fmt::writer::MakeWriter<'a> for TimestampedRollingAppender {
    type Writer = RollingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let now = self.now();
        self.state
            .rollover_if_needed(&mut self.writer.write(), now);
        RollingWriter {
            inner: self.writer.read(),
        }
    }
}

impl fmt::Debug for TimestampedRollingAppender {
    // This manual impl is required because of the `now` field (only present
    // with `cfg(test)`), which is not `Debug`...
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampedRollingAppender")
            .field("state", &self.state)
            .field("writer", &self.writer)
            .finish()
    }
}

/// Creates a file appender that rotates based on file size, with the default
/// retention settings.
///
/// The appender returned by `rolling::max_size` can be used with
/// `non_blocking` to create a non-blocking, size-based file appender.
///
/// `path` names the active log file; rotated-out files are placed next to it
/// as `<path>.<timestamp>`. `max_file_size` is the size, in bytes, at or
/// above which the file is rotated.
///
/// # Examples
///
/// ```rust
/// # #[clippy::allow(needless_doctest_main)]
/// fn main () {
/// # fn doc() {
///     let appender = timestamped_appender::rolling::max_size("/some/path/rolling.log", 100_000_000);
///     let (non_blocking_appender, _guard) = timestamped_appender::non_blocking(appender);
///
///     let subscriber = tracing_subscriber::fmt().with_writer(non_blocking_appender);
///
///     tracing::subscriber::with_default(subscriber.finish(), || {
///         tracing::event!(tracing::Level::INFO, "Hello");
///     });
/// # }
/// }
/// ```
pub fn max_size(path: impl AsRef<Path>, max_file_size: u64) -> TimestampedRollingAppender {
    TimestampedRollingAppender::new(path, max_file_size)
}

// === impl RollingWriter ===

impl io::Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.inner).flush()
    }
}

// === impl Inner ===

impl Inner {
    fn new(builder: Builder, path: &Path) -> Result<(Self, RwLock<File>), InitError> {
        let Builder {
            name,
            max_file_size,
            max_backup_count,
            max_backup_days,
            compress,
            append,
            mode,
        } = builder;

        let path_str = path
            .to_str()
            .ok_or_else(|| InitError::invalid_path("path must be valid UTF-8"))?;
        if path_str.is_empty() {
            return Err(InitError::invalid_path("path is empty"));
        }
        let (dir, base_name) = timestamp::split_path(path_str);
        if base_name.is_empty() {
            return Err(InitError::invalid_path("path lacks a file name"));
        }
        let dir = if dir.is_empty() { "/" } else { dir };

        let inner = Inner {
            name,
            base_path: PathBuf::from(path_str),
            lock_path: PathBuf::from(format!("{}/.{}.lock", dir, base_name)),
            log_directory: dir.to_string(),
            base_name: base_name.to_string(),
            max_file_size,
            retention: RetentionPolicy {
                max_backups: max_backup_count,
                max_days: max_backup_days,
            },
            compress,
            append,
            mode,
        };

        // The lock file only has to exist by the time a rotation needs it,
        // and the rotation path creates it on demand.
        if let Err(err) = inner.open_lock_file() {
            eprintln!(
                "{}: Couldn't create lock file {}: {}",
                inner.label(),
                inner.lock_path.display(),
                err
            );
        }

        let truncate = !inner.append;
        let file = inner
            .open_active_file(truncate)
            .map_err(InitError::ctx("failed to create initial log file"))?;

        Ok((inner, RwLock::new(file)))
    }

    /// Label for diagnostics: the configured name, or the log file name for
    /// an unnamed appender.
    fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.base_name
        } else {
            &self.name
        }
    }

    /// Rotates the active file if it has reached the size threshold,
    /// coordinating with other processes through the lock file.
    ///
    /// Never fails: any error on the rotation path is reported and the
    /// caller's write proceeds against whatever file handle is in place.
    fn rollover_if_needed(&self, file: &mut File, now: i64) {
        let offset = match file.seek(SeekFrom::End(0)) {
            Ok(offset) => offset,
            Err(err) => {
                eprintln!(
                    "{}: Couldn't seek to the end of {}: {}",
                    self.label(),
                    self.base_path.display(),
                    err
                );
                return;
            }
        };
        if offset < self.max_file_size {
            return;
        }

        let lock_file = match self.open_lock_file() {
            Ok(lock_file) => lock_file,
            Err(err) => {
                eprintln!(
                    "{}: Couldn't open lock file {}: {}",
                    self.label(),
                    self.lock_path.display(),
                    err
                );
                return;
            }
        };
        if let Err(err) = lock_file.lock_exclusive() {
            eprintln!(
                "{}: Couldn't lock {}: {}",
                self.label(),
                self.lock_path.display(),
                err
            );
            return;
        }

        // Another process may have rotated while we waited on the lock;
        // reopen and re-check before rolling over ourselves.
        match self.open_active_file(false) {
            Ok(reopened) => *file = reopened,
            Err(err) => eprintln!(
                "{}: Couldn't reopen {}: {}",
                self.label(),
                self.base_path.display(),
                err
            ),
        }
        match file.seek(SeekFrom::End(0)) {
            Ok(offset) if offset >= self.max_file_size => self.roll_over(file, now),
            Ok(_) => {}
            Err(err) => eprintln!(
                "{}: Couldn't seek to the end of {}: {}",
                self.label(),
                self.base_path.display(),
                err
            ),
        }

        if let Err(err) = lock_file.unlock() {
            eprintln!(
                "{}: Couldn't unlock {}: {}",
                self.label(),
                self.lock_path.display(),
                err
            );
        }
    }

    /// Promotes the active file to a timestamped backup, compresses it,
    /// prunes old backups, and reopens a fresh active file.
    ///
    /// Must be called with the rotation lock held.
    fn roll_over(&self, file: &mut File, now: i64) {
        let stamp = timestamp::format_timestamp(now).unwrap_or_else(|| now.to_string());
        let backup_path = self.sibling_path(&stamp);
        if let Err(err) = fs::rename(&self.base_path, &backup_path) {
            eprintln!(
                "{}: Couldn't rename {} to {}: {}",
                self.label(),
                self.base_path.display(),
                backup_path.display(),
                err
            );
        }

        compress::compress_backup(self.compress.as_deref(), backup_path);

        let mut backups = self.scan_backups();
        backups.sort_by_key(|backup| backup.timestamp);
        let cutoff = self.retention.cutoff(&backups, now);
        for backup in &backups[..cutoff] {
            if let Err(err) = fs::remove_file(&backup.path) {
                eprintln!(
                    "{}: Couldn't remove old log file {}: {}",
                    self.label(),
                    backup.path.display(),
                    err
                );
            }
        }

        match self.open_active_file(false) {
            Ok(fresh) => *file = fresh,
            Err(err) => eprintln!(
                "{}: Couldn't reopen {}: {}",
                self.label(),
                self.base_path.display(),
                err
            ),
        }
    }

    /// Enumerates the backups of this log in its directory.
    ///
    /// Legacy index-suffixed files are renamed to timestamp form (and
    /// compressed) as they are encountered, so the entries returned always
    /// carry a timestamp. An enumeration error discards the whole result
    /// set: retention must not delete based on a partial view.
    fn scan_backups(&self) -> Vec<Backup> {
        let read_dir = match fs::read_dir(&self.log_directory) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                eprintln!(
                    "{}: Couldn't read log directory {}: {}",
                    self.label(),
                    self.log_directory,
                    err
                );
                return Vec::new();
            }
        };

        let mut backups = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    eprintln!(
                        "{}: Couldn't enumerate log directory {}: {}",
                        self.label(),
                        self.log_directory,
                        err
                    );
                    return Vec::new();
                }
            };
            if let Some(backup) = self.examine_entry(&entry) {
                backups.push(backup);
            }
        }
        backups
    }

    fn examine_entry(&self, entry: &fs::DirEntry) -> Option<Backup> {
        let metadata = entry.metadata().ok()?;
        // Rotation only ever creates files; never touch a directory or
        // symlink that happens to share the name prefix.
        if !metadata.is_file() {
            return None;
        }

        let file_name = entry.file_name();
        let file_name = file_name.to_str()?;
        let suffix = file_name.strip_prefix(self.base_name.as_str())?;
        if suffix.is_empty() {
            // The active file itself.
            return None;
        }

        let path = entry.path();
        match suffix::classify(suffix) {
            Some(Suffix::Timestamp(timestamp)) | Some(Suffix::Epoch(timestamp)) => {
                Some(Backup { timestamp, path })
            }
            Some(Suffix::LegacyIndex(_)) => self.reconcile_legacy(&path, &metadata),
            None => {
                eprintln!(
                    "{}: Couldn't extract a timestamp from {}",
                    self.label(),
                    path.display()
                );
                None
            }
        }
    }

    /// Renames a backup from the old index-based naming scheme to timestamp
    /// form, stamping it with its mtime, and compresses it.
    fn reconcile_legacy(&self, path: &Path, metadata: &fs::Metadata) -> Option<Backup> {
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                eprintln!(
                    "{}: Couldn't read the mtime of {}: {}",
                    self.label(),
                    path.display(),
                    err
                );
                return None;
            }
        };
        let mtime = match modified.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(_) => {
                eprintln!(
                    "{}: Couldn't use the pre-epoch mtime of {}",
                    self.label(),
                    path.display()
                );
                return None;
            }
        };

        let stamp = timestamp::format_timestamp(mtime).unwrap_or_else(|| mtime.to_string());
        let reconciled = self.sibling_path(&stamp);
        if let Err(err) = fs::rename(path, &reconciled) {
            eprintln!(
                "{}: Couldn't rename legacy backup {} to {}: {}",
                self.label(),
                path.display(),
                reconciled.display(),
                err
            );
            return None;
        }

        let final_path = compress::compress_backup(self.compress.as_deref(), reconciled);
        Some(Backup {
            timestamp: mtime,
            path: final_path,
        })
    }

    fn sibling_path(&self, stamp: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}/{}.{}",
            self.log_directory, self.base_name, stamp
        ))
    }

    fn open_active_file(&self, truncate: bool) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if truncate {
            options.truncate(true);
        } else {
            options.append(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.mode);
        }

        match options.open(&self.base_path) {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match self.base_path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => {
                        fs::create_dir_all(parent)?;
                        options.open(&self.base_path)
                    }
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn open_lock_file(&self) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        options.open(&self.lock_path)
    }
}

impl fmt::Debug for Inner {
    // Manual impl because `Box<dyn Compress>` has no `Debug`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("lock_path", &self.lock_path)
            .field("max_file_size", &self.max_file_size)
            .field("retention", &self.retention)
            .field("compress", &self.compress.as_ref().map(|_| ".."))
            .field("append", &self.append)
            .field("mode", &format_args!("{:#o}", self.mode))
            .finish()
    }
}
