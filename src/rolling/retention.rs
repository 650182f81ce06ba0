//! Backup retention policy.

use std::path::PathBuf;

/// A backup file discovered in the log directory, keyed by the instant it
/// was rotated out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Backup {
    pub(crate) timestamp: i64,
    pub(crate) path: PathBuf,
}

/// Caps on how many backups are kept and for how long. `None` means
/// unbounded for that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetentionPolicy {
    pub(crate) max_backups: Option<usize>,
    pub(crate) max_days: Option<u32>,
}

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

impl RetentionPolicy {
    /// Returns the index of the first backup to retain in a list sorted by
    /// ascending timestamp; everything before it is to be deleted.
    ///
    /// The count cap keeps the newest `max_backups` entries. The age cap
    /// keeps entries stamped at or after `now - max_days` days; the boundary
    /// is found by bisection, so equal timestamps stay together on whichever
    /// side of the cut their position puts them.
    pub(crate) fn cutoff(&self, backups: &[Backup], now: i64) -> usize {
        let mut cutoff = 0;

        if let Some(max_backups) = self.max_backups {
            cutoff = cutoff.max(backups.len().saturating_sub(max_backups));
        }

        if let Some(max_days) = self.max_days {
            let threshold = now - i64::from(max_days) * SECONDS_PER_DAY;
            cutoff = cutoff.max(backups.partition_point(|backup| backup.timestamp < threshold));
        }

        cutoff
    }
}
