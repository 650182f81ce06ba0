use std::fs;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use timestamped_appender::non_blocking::NonBlockingBuilder;
use timestamped_appender::rolling::TimestampedRollingAppender;

/// Dropping the guard while a peer process holds the rotation lock gives up
/// after the configured timeout instead of stalling teardown, and the queued
/// line still reaches the log once the lock is released.
#[test]
fn shutdown_timeout_is_bounded_while_the_rotation_lock_is_held() {
    let timeout = Duration::from_millis(300);
    let directory = tempfile::tempdir().expect("failed to create tempdir");
    let base = directory.path().join("app.log");

    // Over the threshold already, so the first write tries to rotate.
    fs::write(&base, "x".repeat(100)).expect("failed to prefill the log");

    let appender = TimestampedRollingAppender::builder()
        .max_file_size(100)
        .max_backup_count(None)
        .max_backup_days(None)
        .build(&base)
        .expect("failed to build appender");

    // Stand in for a peer process that is mid-rotation.
    let peer_lock = fs::File::open(directory.path().join(".app.log.lock"))
        .expect("failed to open the lock file");
    peer_lock.lock_exclusive().expect("failed to take the rotation lock");

    let (mut non_blocking, guard) = NonBlockingBuilder::default()
        .shutdown_timeout(timeout)
        .finish(appender);

    non_blocking.write_all(b"pending line\n").unwrap();

    // Give the worker time to pick the line up and wedge on the lock.
    thread::sleep(Duration::from_millis(200));

    let start = Instant::now();
    drop(guard);
    let elapsed = start.elapsed();

    assert!(
        elapsed >= timeout,
        "shutdown completed before the timeout: {:?}, expected at least {:?}",
        elapsed,
        timeout
    );

    // Once the peer is done the wedged write goes through: the full file is
    // rotated out and the queued line lands in the fresh one.
    peer_lock.unlock().expect("failed to release the rotation lock");

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let active = fs::read_to_string(&base).unwrap_or_default();
        if active.contains("pending line") {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "queued line never arrived; active file holds {:?}",
            active
        );
        thread::sleep(Duration::from_millis(50));
    }
}
