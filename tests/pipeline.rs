use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use feedsnap::adapters::{CsvTokenizer, DirFeedSource};
use feedsnap::feed::digest_identifier;
use feedsnap::{pipeline, Config, FeedError, RunOutcome, StoreError};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("feedsnap-{}-{}-{}", prefix, pid, t))
}

// 14:30 UTC: daily window = 2026-08-22 full day, delta = slot 2 of 2026-08-23.
fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 23, 14, 30, 0).unwrap()
}

fn write_feed(feed_dir: &Path, feed: &str, rows: &[(&str, &str, &str)]) {
    fs::create_dir_all(feed_dir).unwrap();
    let mut text = String::new();
    for (id, occurrences, last_seen) in rows {
        text.push_str(&format!("\"{}\",\"{}\",\"{}\"\n", id, occurrences, last_seen));
    }
    fs::write(feed_dir.join(format!("{}.csv", feed)), text).unwrap();
}

fn seed_feeds(feed_dir: &Path) {
    write_feed(
        feed_dir,
        "ipv4",
        &[
            ("198.51.100.7", "3", "2026-08-22 10:00:00"),
            ("203.0.113.9", "1", "2026-08-23 07:30:00"),
        ],
    );
    write_feed(feed_dir, "ipv6", &[("2001:db8::1", "2", "2026-08-22 23:59:59")]);
    write_feed(feed_dir, "email", &[("spam@example.org", "5", "2026-08-23 06:00:00")]);
    write_feed(feed_dir, "username", &[("baduser", "4", "2026-08-20 12:00:00")]);
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn full_run_writes_both_snapshots_and_index() -> Result<()> {
    let root = unique_root("run");
    let feed_dir = root.join("feeds");
    let out_dir = root.join("out");
    seed_feeds(&feed_dir);

    // Expired leftover from long ago: must be pruned by the same run.
    let stale = out_dir.join("2026-08-01");
    fs::create_dir_all(&stale)?;
    fs::write(stale.join("full.json"), b"{}\n")?;

    let cfg = Config::new(out_dir.clone(), None, None);
    let source = DirFeedSource::new(feed_dir);
    let report = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;

    assert_eq!(report.outcome(), RunOutcome::Success);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.pruned.len(), 1);
    assert!(!stale.exists());

    // Daily: only records last seen on 2026-08-22.
    let full = read_json(&out_dir.join("2026-08-22").join("full.json"));
    assert_eq!(full["meta"]["type"], "day");
    assert_eq!(full["ipv4"][&digest_identifier("198.51.100.7", "")], 3);
    assert_eq!(full["ipv4"].as_object().unwrap().len(), 1);
    assert_eq!(full["ipv6"][&digest_identifier("2001:db8::1", "")], 2);
    assert_eq!(full["email"].as_object().unwrap().len(), 0);
    assert_eq!(full["username"].as_object().unwrap().len(), 0);

    // Delta slot 2 of today: [06:00:00, 11:59:59].
    let delta = read_json(&out_dir.join("2026-08-23").join("delta2.json"));
    assert_eq!(delta["meta"]["type"], "delta2");
    assert_eq!(delta["meta"]["start"], "2026-08-23T06:00:00Z");
    assert_eq!(delta["meta"]["end"], "2026-08-23T11:59:59Z");
    assert_eq!(delta["ipv4"][&digest_identifier("203.0.113.9", "")], 1);
    assert_eq!(delta["email"][&digest_identifier("spam@example.org", "")], 5);
    assert_eq!(delta["ipv6"].as_object().unwrap().len(), 0);

    // Index: most recent first, correct manifests, no expired entry.
    let index = read_json(&out_dir.join("index.json"));
    let entries = index.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["date"], "2026-08-23");
    assert_eq!(entries[0]["files"]["delta2"], true);
    assert_eq!(entries[0]["files"]["full"], false);
    assert_eq!(entries[1]["date"], "2026-08-22");
    assert_eq!(entries[1]["files"]["full"], true);
    Ok(())
}

#[test]
fn rerun_with_same_clock_is_idempotent() -> Result<()> {
    let root = unique_root("idem");
    let feed_dir = root.join("feeds");
    let out_dir = root.join("out");
    seed_feeds(&feed_dir);

    let cfg = Config::new(out_dir.clone(), None, None);
    let source = DirFeedSource::new(feed_dir);

    let first = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;
    assert_eq!(first.outcome(), RunOutcome::Success);
    let full_path = out_dir.join("2026-08-22").join("full.json");
    let delta_path = out_dir.join("2026-08-23").join("delta2.json");
    let index_path = out_dir.join("index.json");
    let before = (
        fs::read(&full_path)?,
        fs::read(&delta_path)?,
        fs::read(&index_path)?,
    );

    let second = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;
    assert_eq!(second.outcome(), RunOutcome::Success);
    assert!(second.written.is_empty(), "nothing pending on the second run");
    assert!(second.pruned.is_empty(), "no re-deletions");

    let after = (
        fs::read(&full_path)?,
        fs::read(&delta_path)?,
        fs::read(&index_path)?,
    );
    assert_eq!(before, after, "byte-identical artifacts");
    Ok(())
}

#[test]
fn missing_feed_is_partial_with_empty_section() -> Result<()> {
    let root = unique_root("partial");
    let feed_dir = root.join("feeds");
    let out_dir = root.join("out");
    seed_feeds(&feed_dir);
    fs::remove_file(feed_dir.join("email.csv"))?;

    let cfg = Config::new(out_dir.clone(), None, None);
    let source = DirFeedSource::new(feed_dir);
    let report = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;

    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert_eq!(report.feed_failures.len(), 1);
    assert!(matches!(
        report.feed_failures[0],
        FeedError::Fetch { feed, .. } if feed == feedsnap::FeedType::Email
    ));

    // Snapshots are still delivered, email just has no data.
    assert_eq!(report.written.len(), 2);
    let delta = read_json(&out_dir.join("2026-08-23").join("delta2.json"));
    assert_eq!(delta["email"].as_object().unwrap().len(), 0);
    assert_eq!(delta["ipv4"].as_object().unwrap().len(), 1);
    Ok(())
}

#[test]
fn zero_byte_feed_is_a_failed_fetch_not_a_wipe() -> Result<()> {
    let root = unique_root("zerobyte");
    let feed_dir = root.join("feeds");
    let out_dir = root.join("out");
    let store_dir = out_dir.join("store");
    seed_feeds(&feed_dir);

    let cfg = Config::new(out_dir.clone(), None, None);
    let source = DirFeedSource::new(feed_dir.clone());

    // First run populates the username store.
    let first = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;
    assert_eq!(first.outcome(), RunOutcome::Success);
    let table = store_dir.join("username.tbl");
    let before = fs::read(&table)?;

    // Upstream hands back an empty body; a later window becomes pending.
    fs::write(feed_dir.join("username.csv"), b"")?;
    let later = Utc.with_ymd_and_hms(2026, 8, 23, 20, 0, 0).unwrap();
    let report = pipeline::run(&cfg, later, &source, &CsvTokenizer)?;

    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert!(matches!(
        report.feed_failures[0],
        FeedError::Store(StoreError::EmptyIngest { feed }) if feed == feedsnap::FeedType::Username
    ));
    assert_eq!(fs::read(&table)?, before, "store bytes must be unchanged");
    Ok(())
}

#[test]
fn unreadable_store_fails_the_run_and_withholds_snapshots() -> Result<()> {
    let root = unique_root("failedstore");
    let feed_dir = root.join("feeds");
    let out_dir = root.join("out");
    seed_feeds(&feed_dir);

    // Garbage where the email table should be.
    let store_dir = out_dir.join("store");
    fs::create_dir_all(&store_dir)?;
    fs::write(store_dir.join("email.tbl"), b"not a table")?;

    let cfg = Config::new(out_dir.clone(), None, None);
    let source = DirFeedSource::new(feed_dir);
    let report = pipeline::run(&cfg, fixed_now(), &source, &CsvTokenizer)?;

    assert_eq!(report.outcome(), RunOutcome::Failed);
    assert_eq!(report.run_errors.len(), 2, "both pending windows undelivered");
    assert!(
        !out_dir.join("2026-08-22").join("full.json").exists(),
        "no partial snapshot may appear"
    );
    // The index is still rebuilt.
    assert!(out_dir.join("index.json").exists());
    Ok(())
}
