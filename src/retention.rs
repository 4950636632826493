//! retention — rebuild the snapshot index and prune expired directories.
//!
//! Evaluated fresh on every run, never patched incrementally:
//! - retain: date-named directory within the horizon (today + 14 prior days)
//!   — contributes a manifest entry.
//! - expire: date-named but outside the horizon (future dates included) —
//!   deleted after the index is durably rewritten.
//! - ignore: anything else — skipped, never deleted.
//!
//! The index write strictly precedes the deletions, so a crash mid-run never
//! leaves the index describing removed directories. Deletion failures are
//! reported, not fatal: the rebuilt index never lists expired entries either
//! way.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{delta_file, FULL_FILE, INDEX_FILE, RETENTION_DAYS};
use crate::util::atomic_write;

/// Which of the five expected snapshot files exist for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    pub full: bool,
    pub delta1: bool,
    pub delta2: bool,
    pub delta3: bool,
    pub delta4: bool,
}

impl FileManifest {
    fn scan(dir: &Path) -> FileManifest {
        FileManifest {
            full: dir.join(FULL_FILE).is_file(),
            delta1: dir.join(delta_file(1)).is_file(),
            delta2: dir.join(delta_file(2)).is_file(),
            delta3: dir.join(delta_file(3)).is_file(),
            delta4: dir.join(delta_file(4)).is_file(),
        }
    }

    fn any(&self) -> bool {
        self.full || self.delta1 || self.delta2 || self.delta3 || self.delta4
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub date: String,
    pub files: FileManifest,
}

/// Result of one rebuild: what the index now lists, what was pruned, and
/// which prunes failed (best-effort).
#[derive(Debug, Default)]
pub struct RetentionReport {
    pub entries: Vec<IndexEntry>,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Directory name parses as a strict YYYY-MM-DD date. Round-trips through
/// formatting so "2026-1-1" and friends do not slip through.
fn parse_date_dir(name: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()?;
    if date.format("%Y-%m-%d").to_string() == name {
        Some(date)
    } else {
        None
    }
}

/// Enumerate, classify, rewrite index.json, then delete expired directories.
pub fn rebuild_index(today: NaiveDate, out_dir: &Path) -> Result<RetentionReport> {
    let oldest = today - Duration::days(RETENTION_DAYS - 1);

    let mut dated: Vec<(NaiveDate, PathBuf)> = Vec::new();
    let mut expired: Vec<PathBuf> = Vec::new();

    let entries =
        fs::read_dir(out_dir).with_context(|| format!("read snapshot root {}", out_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("enumerate {}", out_dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let date = match parse_date_dir(&name) {
            Some(d) => d,
            None => continue,
        };
        if date >= oldest && date <= today {
            dated.push((date, path));
        } else {
            expired.push(path);
        }
    }

    // Most recent date first; dates are unique keys, ties cannot happen.
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let mut index: Vec<IndexEntry> = Vec::with_capacity(dated.len());
    for (date, path) in &dated {
        let files = FileManifest::scan(path);
        if files.any() {
            index.push(IndexEntry {
                date: date.format("%Y-%m-%d").to_string(),
                files,
            });
        }
    }

    let index_path = out_dir.join(INDEX_FILE);
    let mut bytes = serde_json::to_vec_pretty(&index).context("serialize index")?;
    bytes.push(b'\n');
    atomic_write(&index_path, &bytes)
        .with_context(|| format!("write index {}", index_path.display()))?;
    info!("index rebuilt: {} dates listed", index.len());

    // Only after the index is durable may expired directories go away.
    let mut report = RetentionReport {
        entries: index,
        ..RetentionReport::default()
    };
    for dir in expired {
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("removed expired snapshot dir {}", dir.display());
                report.removed.push(dir);
            }
            Err(e) => {
                warn!("failed to remove expired dir {}: {}", dir.display(), e);
                report.failures.push((dir, e.to_string()));
            }
        }
    }
    Ok(report)
}
