//! pipeline — one scheduled batch run, end to end.
//!
//! Order of stages:
//! 1. take the run lock on the snapshot root;
//! 2. compute pending windows (nothing pending → skip ingestion entirely);
//! 3. ingest all four feed types concurrently — fetch, tokenize, digest,
//!    upsert, garbage-collect — with per-type isolation: one type's failure
//!    is logged and recorded, the others proceed;
//! 4. write every pending snapshot (failure here is run-level: the artifact
//!    was not delivered);
//! 5. rebuild the retention index and prune expired directories.
//!
//! The function returns a report rather than aborting on per-type errors;
//! only setup problems (lock, output directory) are hard errors.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{FeedError, RunError, StoreError};
use crate::feed::{prepare_rows, FeedSource, FeedType, RowTokenizer};
use crate::lock;
use crate::retention;
use crate::schedule;
use crate::snapshot;
use crate::store::HashStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Everything delivered, no failures of any kind.
    Success,
    /// All artifacts delivered, but some per-type or cleanup failures.
    Partial,
    /// A snapshot or the index was not delivered.
    Failed,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub written: Vec<PathBuf>,
    pub feed_failures: Vec<FeedError>,
    pub gc_failures: Vec<StoreError>,
    pub run_errors: Vec<RunError>,
    pub pruned: Vec<PathBuf>,
    pub cleanup_failures: Vec<(PathBuf, String)>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if !self.run_errors.is_empty() {
            RunOutcome::Failed
        } else if !self.feed_failures.is_empty()
            || !self.gc_failures.is_empty()
            || !self.cleanup_failures.is_empty()
        {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        }
    }
}

/// Execute one batch run at instant `now`.
pub fn run(
    cfg: &Config,
    now: DateTime<Utc>,
    source: &dyn FeedSource,
    tokenizer: &dyn RowTokenizer,
) -> Result<RunReport> {
    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("create output dir {}", cfg.out_dir.display()))?;
    let _lock = lock::try_acquire_exclusive(&cfg.out_dir)?;

    let due = schedule::due_windows(now, &cfg.out_dir);
    let mut report = RunReport::default();

    if due.is_empty() {
        info!("no pending snapshot windows, skipping ingestion");
    } else {
        let mut stores: BTreeMap<FeedType, HashStore> = BTreeMap::new();
        for feed in FeedType::ALL {
            match HashStore::open(&cfg.store_dir, feed) {
                Ok(store) => {
                    stores.insert(feed, store);
                }
                Err(e) => {
                    error!("failed to open the store for '{}': {}", feed, e);
                    report.feed_failures.push(e.into());
                }
            }
        }

        ingest_all(&mut stores, cfg, source, tokenizer, &mut report);

        if stores.len() == FeedType::ALL.len() {
            for window in &due {
                match snapshot::write_snapshot(&stores, window, &cfg.out_dir) {
                    Ok(path) => {
                        info!(
                            "wrote '{}' snapshot for {} ({})",
                            window.kind.label(),
                            window.date,
                            path.display()
                        );
                        report.written.push(path);
                    }
                    Err(e) => {
                        error!(
                            "snapshot '{}' for {} failed: {:#}",
                            window.kind.label(),
                            window.date,
                            e
                        );
                        report.run_errors.push(RunError::Snapshot {
                            label: window.kind.label(),
                            date: window.date,
                            reason: format!("{:#}", e),
                        });
                    }
                }
            }
        } else {
            // A snapshot missing a feed type is invalid; do not mark the
            // window as done, the next run retries from scratch.
            for window in &due {
                report.run_errors.push(RunError::Snapshot {
                    label: window.kind.label(),
                    date: window.date,
                    reason: "one or more stores unavailable".to_string(),
                });
            }
        }
    }

    match retention::rebuild_index(now.date_naive(), &cfg.out_dir) {
        Ok(r) => {
            report.pruned = r.removed;
            report.cleanup_failures = r.failures;
        }
        Err(e) => {
            error!("index rebuild failed: {:#}", e);
            report.run_errors.push(RunError::Index {
                reason: format!("{:#}", e),
            });
        }
    }

    Ok(report)
}

/// Fan out ingestion over all opened stores; join all results. Panics in a
/// worker are contained and reported as that type's failure.
fn ingest_all(
    stores: &mut BTreeMap<FeedType, HashStore>,
    cfg: &Config,
    source: &dyn FeedSource,
    tokenizer: &dyn RowTokenizer,
    report: &mut RunReport,
) {
    let salt = cfg.salt.as_str();
    let mut results: Vec<(FeedType, Result<usize, FeedError>, Option<StoreError>)> = Vec::new();

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(stores.len());
        for (feed, store) in stores.iter_mut() {
            let feed = *feed;
            handles.push((
                feed,
                scope.spawn(move || ingest_one(feed, store, source, tokenizer, salt)),
            ));
        }
        for (feed, handle) in handles {
            match handle.join() {
                Ok((res, gc)) => results.push((feed, res, gc)),
                Err(_) => results.push((
                    feed,
                    Err(FeedError::Parse {
                        feed,
                        reason: "ingestion worker panicked".to_string(),
                    }),
                    None,
                )),
            }
        }
    });

    for (feed, res, gc) in results {
        match res {
            Ok(rows) => info!("ingested {} rows for '{}'", rows, feed),
            Err(e) => {
                error!("{}", e);
                report.feed_failures.push(e);
            }
        }
        if let Some(e) = gc {
            warn!("failed to garbage collect the data for '{}': {}", feed, e);
            report.gc_failures.push(e);
        }
    }
}

/// One feed type: fetch -> tokenize -> digest/parse -> upsert -> gc.
/// "Unavailable" and zero rows both leave the store untouched. GC failure is
/// returned separately: stale-but-harmless records beat losing live ones.
fn ingest_one(
    feed: FeedType,
    store: &mut HashStore,
    source: &dyn FeedSource,
    tokenizer: &dyn RowTokenizer,
    salt: &str,
) -> (Result<usize, FeedError>, Option<StoreError>) {
    let bytes = match source.fetch(feed) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return (
                Err(FeedError::Fetch {
                    feed,
                    reason: "source reported unavailable".to_string(),
                }),
                None,
            )
        }
        Err(e) => {
            return (
                Err(FeedError::Fetch {
                    feed,
                    reason: format!("{:#}", e),
                }),
                None,
            )
        }
    };

    let raw = match tokenizer.tokenize(&bytes) {
        Ok(raw) => raw,
        Err(e) => {
            return (
                Err(FeedError::Parse {
                    feed,
                    reason: format!("{:#}", e),
                }),
                None,
            )
        }
    };

    let rows = match prepare_rows(feed, &raw, salt) {
        Ok(rows) => rows,
        Err(e) => return (Err(e), None),
    };

    let count = match store.upsert_all(&rows) {
        Ok(count) => count,
        Err(e) => return (Err(e.into()), None),
    };

    let gc = match store.garbage_collect() {
        Ok(removed) if removed > 0 => {
            info!("garbage collected {} stale records for '{}'", removed, feed);
            None
        }
        Ok(_) => None,
        Err(e) => Some(e),
    };

    (Ok(count), gc)
}
