use std::fs;
use timestamped_appender::rolling::TimestampedRollingAppender;
use tracing_subscriber::prelude::*;

/// Every byte handed to the non-blocking writer ends up either in the
/// active file or in the single backup produced by the rotation.
#[test]
fn no_lines_are_lost_across_a_rotation() {
    let directory = tempfile::tempdir().expect("failed to create tempdir");
    let base = directory.path().join("app.log");

    // Start over the threshold so the first event triggers the only
    // rotation of this test.
    let prefill = "x".repeat(100);
    fs::write(&base, &prefill).expect("failed to prefill the log");

    let appender = TimestampedRollingAppender::builder()
        .max_file_size(100)
        .max_backup_count(None)
        .max_backup_days(None)
        .build(&base)
        .expect("failed to build appender");
    let (non_blocking, guard) = timestamped_appender::non_blocking(appender);

    let default = tracing_subscriber::fmt()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_writer(non_blocking)
        .finish()
        .set_default();

    for i in 0..10 {
        tracing::info!("line {}", i);
    }

    drop(default);
    drop(guard);

    let active = fs::read_to_string(&base).expect("failed to read active file");
    for i in 0..10 {
        assert!(active.contains(&format!("line {}", i)), "missing line {}", i);
    }

    let backups: Vec<_> = fs::read_dir(directory.path())
        .expect("failed to read directory")
        .map(|entry| entry.expect("expected dir entry"))
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_str().expect("file name should be UTF-8");
            name.starts_with("app.log") && name.len() > "app.log".len()
        })
        .collect();
    assert_eq!(backups.len(), 1, "expected exactly one backup: {:?}", backups);
    assert_eq!(
        fs::read_to_string(backups[0].path()).expect("failed to read backup"),
        prefill
    );
}
