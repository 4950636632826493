use anyhow::Result;
use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};

use feedsnap::retention::{rebuild_index, IndexEntry};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("feedsnap-{}-{}-{}", prefix, pid, t))
}

fn snapshot_dir(out: &Path, date: NaiveDate, files: &[&str]) {
    let dir = out.join(date.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&dir).unwrap();
    for f in files {
        fs::write(dir.join(f), b"{}\n").unwrap();
    }
}

fn read_index(out: &Path) -> Vec<IndexEntry> {
    let bytes = fs::read(out.join("index.json")).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn horizon_boundary_keeps_day_14_and_drops_15_16() -> Result<()> {
    let out = unique_root("horizon");
    fs::create_dir_all(&out)?;
    let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

    snapshot_dir(&out, today, &["full.json"]);
    snapshot_dir(&out, today - Duration::days(14), &["full.json", "delta2.json"]);
    snapshot_dir(&out, today - Duration::days(15), &["full.json"]);
    snapshot_dir(&out, today - Duration::days(16), &["delta1.json"]);

    let report = rebuild_index(today, &out)?;
    assert_eq!(report.removed.len(), 2);
    assert!(report.failures.is_empty());

    let index = read_index(&out);
    let dates: Vec<&str> = index.iter().map(|e| e.date.as_str()).collect();
    assert_eq!(dates, vec!["2026-08-23", "2026-08-09"], "most recent first");

    assert!(out.join("2026-08-09").is_dir());
    assert!(!out.join("2026-08-08").exists(), "today-15 must be gone");
    assert!(!out.join("2026-08-07").exists(), "today-16 must be gone");

    let old = &index[1];
    assert!(old.files.full && old.files.delta2);
    assert!(!old.files.delta1 && !old.files.delta3 && !old.files.delta4);
    Ok(())
}

#[test]
fn non_date_entries_are_ignored_never_deleted() -> Result<()> {
    let out = unique_root("ignored");
    fs::create_dir_all(&out)?;
    let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

    snapshot_dir(&out, today, &["full.json"]);
    fs::create_dir_all(out.join("store"))?;
    fs::create_dir_all(out.join("2026-08-23-backup"))?;
    // Date-shaped plain file, not a directory: also ignored.
    fs::write(out.join("2020-01-01"), b"not a dir")?;

    let report = rebuild_index(today, &out)?;
    assert!(report.removed.is_empty());
    assert!(out.join("store").is_dir());
    assert!(out.join("2026-08-23-backup").is_dir());
    assert!(out.join("2020-01-01").is_file());

    let index = read_index(&out);
    assert_eq!(index.len(), 1);
    Ok(())
}

#[test]
fn future_dated_directories_expire() -> Result<()> {
    let out = unique_root("future");
    fs::create_dir_all(&out)?;
    let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

    snapshot_dir(&out, today + Duration::days(3), &["full.json"]);
    let report = rebuild_index(today, &out)?;
    assert_eq!(report.removed.len(), 1);
    assert!(read_index(&out).is_empty());
    Ok(())
}

#[test]
fn directories_without_recognized_files_get_no_entry() -> Result<()> {
    let out = unique_root("nofiles");
    fs::create_dir_all(&out)?;
    let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

    snapshot_dir(&out, today, &[]);
    snapshot_dir(&out, today - Duration::days(1), &["garbage.txt"]);

    let report = rebuild_index(today, &out)?;
    assert!(report.removed.is_empty(), "in-horizon dirs are never pruned");
    assert!(read_index(&out).is_empty());
    Ok(())
}

#[test]
fn rebuild_is_idempotent() -> Result<()> {
    let out = unique_root("idem");
    fs::create_dir_all(&out)?;
    let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

    snapshot_dir(&out, today, &["full.json", "delta1.json"]);
    snapshot_dir(&out, today - Duration::days(20), &["full.json"]);

    let first = rebuild_index(today, &out)?;
    assert_eq!(first.removed.len(), 1);
    let bytes_first = fs::read(out.join("index.json"))?;

    let second = rebuild_index(today, &out)?;
    assert!(second.removed.is_empty(), "no duplicate deletions");
    let bytes_second = fs::read(out.join("index.json"))?;
    assert_eq!(bytes_first, bytes_second, "index bytes unchanged");
    Ok(())
}
