//! CLI: one entry point per schedule tick (external cron).
//!
//! Exit codes: 0 = success, 1 = run-level failure (undelivered snapshot or
//! index), 2 = partial (per-type or cleanup failures only).

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use crate::adapters::{CsvTokenizer, DirFeedSource};
use crate::config::Config;
use crate::feed::FeedType;
use crate::pipeline::{self, RunOutcome, RunReport};
use crate::retention;
use crate::schedule;
use crate::store::HashStore;
use crate::{consts, lock};

#[derive(Parser, Debug)]
#[command(
    name = "feedsnap",
    version,
    about = "Deduplicated digest store for abuse feeds with point-in-time JSON snapshots",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Ingest feeds, write pending snapshots, rebuild the retention index.
    Run {
        /// Snapshot output directory (date dirs + index.json).
        #[arg(long)]
        out_dir: PathBuf,
        /// Directory with pre-fetched feed files (<feed>.csv).
        #[arg(long)]
        feed_dir: PathBuf,
        /// Identifier store location (default <out-dir>/store).
        #[arg(long)]
        store_dir: Option<PathBuf>,
        /// Digest salt (default empty).
        #[arg(long)]
        salt: Option<String>,
    },
    /// Rebuild the retention index and prune expired snapshots, nothing else.
    Index {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print pending windows and store sizes as JSON.
    Status {
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            out_dir,
            feed_dir,
            store_dir,
            salt,
        } => {
            let cfg = Config::new(out_dir, store_dir, salt);
            let source = DirFeedSource::new(feed_dir);
            let report = pipeline::run(&cfg, Utc::now(), &source, &CsvTokenizer)?;
            summarize(&report);
            Ok(exit_code(report.outcome()))
        }
        Cmd::Index { out_dir } => {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("create output dir {}", out_dir.display()))?;
            let _lock = lock::try_acquire_exclusive(&out_dir)?;
            let r = retention::rebuild_index(Utc::now().date_naive(), &out_dir)?;
            info!(
                "index lists {} dates, pruned {} dirs",
                r.entries.len(),
                r.removed.len()
            );
            Ok(if r.failures.is_empty() { 0 } else { 2 })
        }
        Cmd::Status { out_dir, store_dir } => {
            let cfg = Config::new(out_dir, store_dir, None);
            status(&cfg)?;
            Ok(0)
        }
    }
}

fn exit_code(outcome: RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Success => 0,
        RunOutcome::Partial => 2,
        RunOutcome::Failed => 1,
    }
}

fn summarize(report: &RunReport) {
    info!(
        "run finished: {} snapshot(s) written, {} pruned dir(s)",
        report.written.len(),
        report.pruned.len()
    );
    for e in &report.feed_failures {
        warn!("feed failure: {}", e);
    }
    for e in &report.run_errors {
        warn!("run error: {}", e);
    }
}

fn status(cfg: &Config) -> Result<()> {
    let now = Utc::now();
    let pending: Vec<serde_json::Value> = schedule::due_windows(now, &cfg.out_dir)
        .iter()
        .map(|w| {
            serde_json::json!({
                "window": w.kind.label(),
                "date": w.date.format("%Y-%m-%d").to_string(),
                "path": w.target_path(&cfg.out_dir),
            })
        })
        .collect();

    let mut stores = serde_json::Map::new();
    for feed in FeedType::ALL {
        let count = match HashStore::open(&cfg.store_dir, feed) {
            Ok(store) => serde_json::json!(store.len()),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        stores.insert(feed.to_string(), count);
    }

    let index_path = cfg.out_dir.join(consts::INDEX_FILE);
    let index_dates = if index_path.exists() {
        let bytes = fs::read(&index_path)
            .with_context(|| format!("read index {}", index_path.display()))?;
        let entries: Vec<retention::IndexEntry> =
            serde_json::from_slice(&bytes).context("parse index")?;
        serde_json::json!(entries.len())
    } else {
        serde_json::json!(null)
    };

    let doc = serde_json::json!({
        "out_dir": cfg.out_dir,
        "store_dir": cfg.store_dir,
        "pending": pending,
        "stores": stores,
        "index_dates": index_dates,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
