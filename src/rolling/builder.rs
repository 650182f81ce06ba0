use super::{Compress, TimestampedRollingAppender};
use std::{fmt, io, path::Path};
use thiserror::Error;

/// Defaults applied by [`Builder::new`].
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of retained backups.
pub const DEFAULT_MAX_BACKUP_COUNT: usize = 2;
/// Default backup age cap, in days.
pub const DEFAULT_MAX_BACKUP_DAYS: u32 = 30;

/// A [builder] for configuring [`TimestampedRollingAppender`]s.
///
/// [builder]: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
pub struct Builder {
    pub(super) name: String,
    pub(super) max_file_size: u64,
    pub(super) max_backup_count: Option<usize>,
    pub(super) max_backup_days: Option<u32>,
    pub(super) compress: Option<Box<dyn Compress>>,
    pub(super) append: bool,
    pub(super) mode: u32,
}

/// Errors returned by [`Builder::build`].
#[derive(Error, Debug)]
#[error("{context}: {source}")]
pub struct InitError {
    context: &'static str,
    #[source]
    source: io::Error,
}

impl InitError {
    pub(crate) fn ctx(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { context, source }
    }

    pub(crate) fn invalid_path(reason: &'static str) -> Self {
        Self {
            context: "invalid log file path",
            source: io::Error::new(io::ErrorKind::InvalidInput, reason),
        }
    }
}

impl Builder {
    /// Returns a new `Builder` with the default parameters.
    ///
    /// # Default Values
    ///
    /// | Parameter | Default Value | Notes |
    /// | :-------- | :------------ | :---- |
    /// | [`name`] | `""` | Only used to label the appender. |
    /// | [`max_file_size`] | 10 MiB | Rotation triggers at or above this size. |
    /// | [`max_backup_count`] | `Some(2)` | `None` keeps every backup. |
    /// | [`max_backup_days`] | `Some(30)` | `None` keeps backups of any age. |
    /// | [`compression`] | none | Backups are kept uncompressed. |
    /// | [`append`] | `true` | `false` truncates the file once, at build time. |
    /// | [`mode`] | `0o644` | Unix permission bits for created files. |
    ///
    /// [`name`]: Self::name
    /// [`max_file_size`]: Self::max_file_size
    /// [`max_backup_count`]: Self::max_backup_count
    /// [`max_backup_days`]: Self::max_backup_days
    /// [`compression`]: Self::compression
    /// [`append`]: Self::append
    /// [`mode`]: Self::mode
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_backup_count: Some(DEFAULT_MAX_BACKUP_COUNT),
            max_backup_days: Some(DEFAULT_MAX_BACKUP_DAYS),
            compress: None,
            append: true,
            mode: 0o644,
        }
    }

    /// Sets the logical name of the appender, used to label its
    /// diagnostics. An unnamed appender's diagnostics are labeled with the
    /// log file name instead.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the size, in bytes, at or above which the active file is rotated
    /// out.
    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Keeps at most `count` backups on disk; older ones are deleted after
    /// each rotation. `None` removes the cap.
    #[must_use]
    pub fn max_backup_count(mut self, count: Option<usize>) -> Self {
        self.max_backup_count = count;
        self
    }

    /// Deletes backups older than `days` days after each rotation. `None`
    /// removes the cap.
    #[must_use]
    pub fn max_backup_days(mut self, days: Option<u32>) -> Self {
        self.max_backup_days = days;
        self
    }

    /// Compresses each rotated-out backup with `compressor`.
    ///
    /// The compressor runs while the rotation lock is held and must not log
    /// through this appender; see [`Compress`].
    #[must_use]
    pub fn compression(mut self, compressor: impl Compress + 'static) -> Self {
        self.compress = Some(Box::new(compressor));
        self
    }

    /// Whether to append to an existing active file (`true`, the default) or
    /// truncate it when the appender is built.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Sets the Unix permission bits for files the appender creates. Ignored
    /// on other platforms.
    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Builds a new [`TimestampedRollingAppender`] writing to `path`, with
    /// backups placed next to it.
    ///
    /// `path` must name a file (with any directory prefix); it is an error
    /// for it to be empty or to end in a path separator.
    ///
    /// # Examples
    ///
    /// ```
    /// use timestamped_appender::rolling::TimestampedRollingAppender;
    ///
    /// # fn docs() {
    /// let appender = TimestampedRollingAppender::builder()
    ///     .max_file_size(50 * 1024 * 1024)
    ///     .max_backup_count(Some(5))
    ///     .max_backup_days(Some(7))
    ///     .build("/var/log/myapp/myapp.log")
    ///     .expect("failed to initialize timestamped rolling appender");
    /// # drop(appender);
    /// # }
    /// ```
    pub fn build(
        self,
        path: impl AsRef<Path>,
    ) -> Result<TimestampedRollingAppender, InitError> {
        TimestampedRollingAppender::from_builder(self, path)
    }

    #[cfg(test)]
    pub(crate) fn build_with_now(
        self,
        path: impl AsRef<Path>,
        now: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Result<TimestampedRollingAppender, InitError> {
        TimestampedRollingAppender::from_builder_with_custom_now(self, path, now)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    // Manual impl because `Box<dyn Compress>` has no `Debug`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("max_file_size", &self.max_file_size)
            .field("max_backup_count", &self.max_backup_count)
            .field("max_backup_days", &self.max_backup_days)
            .field("compress", &self.compress.as_ref().map(|_| ".."))
            .field("append", &self.append)
            .field("mode", &format_args!("{:#o}", self.mode))
            .finish()
    }
}
