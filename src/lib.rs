//! Writers for size-rotated log files.
//!
//! # Overview
//!
//! `timestamped-appender` provides a [`TimestampedRollingAppender`] that
//! appends formatted log records to a single active file and, when that file
//! reaches a configured size, rotates it out under a timestamped name
//! (`app.log.20240115T120000Z`), optionally compressing the backup and
//! pruning older backups by count and by age.
//!
//! The appender is safe to share between processes: cooperating processes
//! appending to the same file coordinate rotation through a sibling lock
//! file, so exactly one of them performs each rotation while the others pick
//! up the fresh file.
//!
//! It also provides a [`non_blocking`][non_blocking()] writer for recording
//! log lines through a dedicated worker thread.
//!
//! [`TimestampedRollingAppender`]: rolling::TimestampedRollingAppender
//!
//! # Usage
//!
//! Add the following to your `Cargo.toml`:
//! ```toml
//! timestamped-appender = "0.1"
//! ```
//!
//! This crate can be used in a few ways to record log output:
//!  - Using a [`TimestampedRollingAppender`] to perform writes to a log
//!    file. This will block on writes, including while a rotation is in
//!    progress.
//!  - Using *any* type implementing [`std::io::Write`][write] in a
//!    non-blocking fashion.
//!  - Using a combination of [`NonBlocking`][non_blocking] and
//!    [`TimestampedRollingAppender`] to write to a rotated log file without
//!    blocking.
//!
//! ## File Appender
//!
//! The [`rolling` module][rolling] provides functions and a builder for
//! creating the file appender.
//!
//! ```rust
//! # fn docs() {
//! let file_appender = timestamped_appender::rolling::max_size("/some/directory/app.log", 10_000_000);
//! # }
//! ```
//!
//! The file appender implements [`std::io::Write`][write], as well as the
//! [`MakeWriter`][make_writer] trait from `tracing-subscriber` so that it
//! can be used directly as a `tracing` writer:
//!
//! ```rust
//! # fn docs() {
//! let file_appender = timestamped_appender::rolling::max_size("/some/directory/app.log", 10_000_000);
//! tracing_subscriber::fmt()
//!     .with_writer(file_appender)
//!     .init();
//! # }
//! ```
//!
//! Backups can be compressed as they are rotated out. With the `gzip`
//! feature (on by default) a ready-made gzip compressor is available, and
//! any [`Compress`][compress] implementation can be supplied instead:
//!
//! ```rust
//! # #[cfg(feature = "gzip")]
//! # fn docs() {
//! use timestamped_appender::rolling::{GzipCompress, TimestampedRollingAppender};
//!
//! let file_appender = TimestampedRollingAppender::builder()
//!     .max_file_size(10 * 1024 * 1024) // rotate at 10 MiB
//!     .max_backup_count(Some(5)) // keep at most five backups
//!     .max_backup_days(Some(7)) // none of them older than a week
//!     .compression(GzipCompress::default())
//!     .build("/some/directory/app.log")
//!     .expect("initializing rolling file appender failed");
//! # drop(file_appender);
//! # }
//! ```
//!
//! [compress]: rolling::Compress
//!
//! ## Non-Blocking Writer
//!
//! The example below demonstrates the construction of a `non_blocking`
//! writer with `std::io::stdout()`, which implements [`MakeWriter`][make_writer].
//!
//! ```rust
//! # fn doc() {
//! let (non_blocking, _guard) = timestamped_appender::non_blocking(std::io::stdout());
//! tracing_subscriber::fmt()
//!     .with_writer(non_blocking)
//!     .init();
//! # }
//! ```
//!
//! **Note:** `_guard` is a [`WorkerGuard`][guard] which is returned by
//! [`timestamped_appender::non_blocking`][non_blocking()] to ensure buffered
//! logs are flushed to their output in the case of abrupt terminations of a
//! process. See [`WorkerGuard` module][guard] for more details.
//!
//! ## Non-Blocking Rolling File Appender
//!
//! ```rust
//! # fn docs() {
//! let file_appender = timestamped_appender::rolling::max_size("/some/directory/app.log", 10_000_000);
//! let (non_blocking, _guard) = timestamped_appender::non_blocking(file_appender);
//! tracing_subscriber::fmt()
//!     .with_writer(non_blocking)
//!     .init();
//! # }
//! ```
//!
//! [write]: std::io::Write
//! [non_blocking]: mod@non_blocking
//! [guard]: non_blocking::WorkerGuard
//! [make_writer]: tracing_subscriber::fmt::writer::MakeWriter
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true
)]
use crate::non_blocking::{NonBlocking, WorkerGuard};

use std::io::Write;

pub mod non_blocking;

pub mod rolling;

mod worker;

pub(crate) mod sync;

/// Convenience function for creating a non-blocking, off-thread writer.
///
/// See the [`non_blocking` module's docs][non_blocking]'s for more details.
///
/// [non_blocking]: mod@non_blocking
///
/// # Examples
///
/// ``` rust
/// # fn docs() {
/// let (non_blocking, _guard) = timestamped_appender::non_blocking(std::io::stdout());
/// let subscriber = tracing_subscriber::fmt().with_writer(non_blocking);
/// tracing::subscriber::with_default(subscriber.finish(), || {
///    tracing::event!(tracing::Level::INFO, "Hello");
/// });
/// # }
/// ```
pub fn non_blocking<T: Write + Send + 'static>(writer: T) -> (NonBlocking, WorkerGuard) {
    NonBlocking::new(writer)
}

#[derive(Debug)]
pub(crate) enum Msg {
    Line(Vec<u8>),
    Shutdown,
}
