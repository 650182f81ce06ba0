//! A non-blocking, off-thread writer.
//!
//! This spawns a dedicated worker thread to collect written log lines and
//! write them to the underlying [`std::io::Write`] implementation, so the
//! calling thread never blocks on log I/O — not even while the appender is
//! rotating a file.
//!
//! The [`non_blocking`][non_blocking()] helper returns the writer together
//! with a [`WorkerGuard`]. Hold on to the guard for as long as log lines may
//! be emitted: dropping it signals the worker to write out everything still
//! queued, bounded by the configured shutdown timeout, so abrupt process
//! terminations lose as little as possible.
//!
//! By default the writer is **lossy**: once the channel to the worker is
//! full, further lines are dropped (and counted) rather than blocking the
//! caller. Use [`NonBlockingBuilder::lossy`] to trade throughput for
//! completeness.
//!
//! [non_blocking()]: crate::non_blocking()
use crate::worker::Worker;
use crate::Msg;
use crossbeam_channel::{bounded, Sender};
use std::io;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing_subscriber::fmt::writer::MakeWriter;

/// The default maximum number of buffered log lines.
///
/// If more lines than this are buffered, new lines will be dropped (in lossy
/// mode) or the caller blocks (in non-lossy mode).
pub const DEFAULT_BUFFERED_LINES_LIMIT: usize = 128_000;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A guard that flushes log lines still in the worker's queue when dropped.
///
/// Writing to a [`NonBlocking`] writer only enqueues the line; this guard is
/// what ties the worker's lifetime to a scope. Keep it around for as long as
/// the corresponding writer is in use, typically for the duration of `main`.
#[must_use]
#[derive(Debug)]
pub struct WorkerGuard {
    _handle: JoinHandle<()>,
    sender: Sender<Msg>,
    shutdown: Sender<()>,
    shutdown_timeout: Duration,
}

/// A non-blocking writer.
///
/// This is returned by [`NonBlockingBuilder::finish`] and the
/// [`non_blocking`][crate::non_blocking()] helper, together with the
/// [`WorkerGuard`] that keeps the worker alive.
#[derive(Clone, Debug)]
pub struct NonBlocking {
    error_counter: ErrorCounter,
    channel: Sender<Msg>,
    is_lossy: bool,
}

/// A counter of log lines dropped because the worker could not keep up.
///
/// Only a lossy [`NonBlocking`] drops lines.
#[derive(Clone, Debug, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl NonBlocking {
    /// Returns a new `NonBlocking` writer wrapping `writer`, with the default
    /// configuration, and the [`WorkerGuard`] tied to its worker thread.
    pub fn new<T: Write + Send + 'static>(writer: T) -> (NonBlocking, WorkerGuard) {
        NonBlockingBuilder::default().finish(writer)
    }

    /// Returns a counter of the log lines dropped so far.
    pub fn error_counter(&self) -> ErrorCounter {
        self.error_counter.clone()
    }
}

impl ErrorCounter {
    /// The number of log lines dropped so far.
    pub fn dropped_lines(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn incr_saturating(&self) {
        let mut curr = self.0.load(Ordering::Acquire);
        // We don't need to enforce any ordering between increments: the
        // counter only has to remain accurate.
        while curr != usize::MAX {
            match self
                .0
                .compare_exchange(curr, curr + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => curr = actual,
            }
        }
    }
}

/// A builder for [`NonBlocking`].
#[derive(Debug)]
pub struct NonBlockingBuilder {
    buffered_lines_limit: usize,
    is_lossy: bool,
    shutdown_timeout: Duration,
}

impl NonBlockingBuilder {
    /// Sets the number of lines to buffer before dropping logs or exerting
    /// backpressure on senders.
    #[must_use]
    pub fn buffered_lines_limit(mut self, buffered_lines_limit: usize) -> NonBlockingBuilder {
        self.buffered_lines_limit = buffered_lines_limit;
        self
    }

    /// Sets whether the writer is lossy.
    ///
    /// A lossy writer (the default) drops lines once the buffer is full; a
    /// non-lossy one blocks the caller instead.
    #[must_use]
    pub fn lossy(mut self, is_lossy: bool) -> NonBlockingBuilder {
        self.is_lossy = is_lossy;
        self
    }

    /// Sets how long dropping the [`WorkerGuard`] may wait for the worker's
    /// final flush before giving up.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> NonBlockingBuilder {
        self.shutdown_timeout = timeout;
        self
    }

    /// Completes the builder, returning the writer and its [`WorkerGuard`].
    pub fn finish<T: Write + Send + 'static>(self, writer: T) -> (NonBlocking, WorkerGuard) {
        let (sender, receiver) = bounded(self.buffered_lines_limit);
        let (shutdown_sender, shutdown_receiver) = bounded(0);

        let worker = Worker::new(receiver, writer, shutdown_receiver);
        let guard = WorkerGuard {
            _handle: worker.worker_thread(),
            sender: sender.clone(),
            shutdown: shutdown_sender,
            shutdown_timeout: self.shutdown_timeout,
        };
        let non_blocking = NonBlocking {
            channel: sender,
            error_counter: ErrorCounter::default(),
            is_lossy: self.is_lossy,
        };

        (non_blocking, guard)
    }
}

impl Default for NonBlockingBuilder {
    fn default() -> Self {
        NonBlockingBuilder {
            buffered_lines_limit: DEFAULT_BUFFERED_LINES_LIMIT,
            is_lossy: true,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl io::Write for NonBlocking {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let buf_size = buf.len();
        if self.is_lossy {
            if self.channel.try_send(Msg::Line(buf.to_vec())).is_err() {
                self.error_counter.incr_saturating();
            }
        } else {
            // If the channel is disconnected the worker is gone; there is
            // nobody left to report the loss to.
            let _ = self.channel.send(Msg::Line(buf.to_vec()));
        }
        Ok(buf_size)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write(buf).map(|_| ())
    }
}

impl<'a> MakeWriter<'a> for NonBlocking {
    type Writer = NonBlocking;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let _ = self
            .sender
            .send_timeout(Msg::Shutdown, Duration::from_millis(100));

        // The worker accepts the rendezvous only once it has drained the
        // channel and flushed, so a successful send here means nothing
        // queued before this drop was lost. The timeout bounds how long a
        // wedged writer can stall process teardown.
        let _ = self.shutdown.send_timeout((), self.shutdown_timeout);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    struct MockWriter {
        tx: mpsc::SyncSender<String>,
    }

    impl MockWriter {
        fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
            let (tx, rx) = mpsc::sync_channel(capacity);
            (Self { tx }, rx)
        }
    }

    impl std::io::Write for MockWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let buf_len = buf.len();
            let _ = self.tx.send(String::from_utf8_lossy(buf).to_string());
            Ok(buf_len)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logs_dropped_if_lossy() {
        // A rendezvous channel wedges the worker on its first write, so the
        // one-line buffer is guaranteed to overflow.
        let (mock_writer, rx) = MockWriter::new(0);

        let (mut non_blocking, _guard) = NonBlockingBuilder::default()
            .lossy(true)
            .buffered_lines_limit(1)
            .shutdown_timeout(Duration::from_millis(100))
            .finish(mock_writer);

        let error_count = non_blocking.error_counter();

        non_blocking.write_all(b"Hello").unwrap();
        non_blocking.write_all(b", World").unwrap();
        non_blocking.write_all(b"!").unwrap();

        // At least one line was dropped: the worker is stuck handing over
        // "Hello", so the channel can hold at most one of the later lines.
        thread::sleep(std::time::Duration::from_millis(200));
        assert!(error_count.dropped_lines() > 0);
        assert_eq!(rx.try_recv().unwrap(), "Hello");
    }

    #[test]
    fn multi_lined_write_if_not_lossy() {
        let (mock_writer, rx) = MockWriter::new(10);

        let (mut non_blocking, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .buffered_lines_limit(10)
            .finish(mock_writer);

        non_blocking.write_all(b"a").unwrap();
        non_blocking.write_all(b"b").unwrap();
        non_blocking.write_all(b"c").unwrap();
        drop(guard);

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn error_counter_caps_at_usize_max() {
        let counter = ErrorCounter(Arc::new(AtomicUsize::new(usize::MAX - 1)));
        counter.incr_saturating();
        assert_eq!(counter.dropped_lines(), usize::MAX);
        counter.incr_saturating();
        assert_eq!(counter.dropped_lines(), usize::MAX);
    }
}
