//! schedule — pure window math and pending-rebuild detection.
//!
//! No persisted schedule state: a window is "pending" exactly while its
//! target file does not exist, which makes the check idempotent and
//! crash-safe. This module never writes anything.
//!
//! Windowing rule (UTC):
//! - daily: the previous full calendar day, [00:00:00, 23:59:59].
//! - delta: the most recently *completed* six-hour slot (1..=4). The
//!   in-progress slot is never targeted, so a delta snapshot is never built
//!   from a truncated window. Hour < 6 means slot 4 of yesterday; otherwise
//!   slot hour/6 of today.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use std::path::{Path, PathBuf};

use crate::consts::{delta_file, DELTA_SLOTS, FULL_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Day,
    /// Six-hour slot, 1..=4.
    Delta(u8),
}

impl WindowKind {
    /// Label used in the snapshot meta ("day", "delta1".."delta4").
    pub fn label(&self) -> String {
        match self {
            WindowKind::Day => "day".to_string(),
            WindowKind::Delta(slot) => format!("delta{}", slot),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            WindowKind::Day => FULL_FILE.to_string(),
            WindowKind::Delta(slot) => delta_file(*slot),
        }
    }
}

/// A closed snapshot interval [start, end] plus where it lands on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub kind: WindowKind,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The daily window: yesterday, full day.
    pub fn daily(now: DateTime<Utc>) -> Window {
        let date = now.date_naive() - Duration::days(1);
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1) - Duration::seconds(1);
        Window {
            kind: WindowKind::Day,
            date,
            start,
            end,
        }
    }

    /// The most recently completed six-hour window.
    pub fn delta(now: DateTime<Utc>) -> Window {
        let hour = now.hour() as u8;
        let (date, slot) = if hour < 6 {
            (now.date_naive() - Duration::days(1), DELTA_SLOTS)
        } else {
            (now.date_naive(), hour / 6)
        };
        let start = date.and_time(NaiveTime::MIN).and_utc()
            + Duration::hours(((slot - 1) * 6) as i64);
        let end = start + Duration::hours(6) - Duration::seconds(1);
        Window {
            kind: WindowKind::Delta(slot),
            date,
            start,
            end,
        }
    }

    /// Date-partitioned directory for this window.
    pub fn dir(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.date.format("%Y-%m-%d").to_string())
    }

    pub fn target_path(&self, out_dir: &Path) -> PathBuf {
        self.dir(out_dir).join(self.kind.file_name())
    }

    /// Pending = the target snapshot file does not exist yet.
    pub fn is_pending(&self, out_dir: &Path) -> bool {
        !self.target_path(out_dir).exists()
    }

    pub fn start_ts(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_ts(&self) -> i64 {
        self.end.timestamp()
    }
}

/// The pending subset of {daily, delta} for this instant.
pub fn due_windows(now: DateTime<Utc>, out_dir: &Path) -> Vec<Window> {
    [Window::daily(now), Window::delta(now)]
        .into_iter()
        .filter(|w| w.is_pending(out_dir))
        .collect()
}
