//! Failure taxonomy.
//!
//! Two tiers, matching how failures propagate:
//! - per-feed-type (fetch/parse/store/gc) — caught and logged at the type
//!   boundary, never escalated to a run-wide abort;
//! - run-level (snapshot write, index rebuild) — an undelivered or
//!   inconsistent artifact, surfaced on the run report.
//!
//! Error text carries only the error kind and the affected key (feed type,
//! date, window) — never a raw identifier.

use std::path::PathBuf;
use thiserror::Error;

use crate::feed::FeedType;

/// Errors from a single feed type's identifier store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A zero-row batch is a failed fetch, not "feed is empty"; accepting it
    /// would turn the next garbage collection into a full wipe.
    #[error("empty ingest batch for '{feed}'")]
    EmptyIngest { feed: FeedType },

    /// A row whose digest is not 64 lowercase hex chars.
    #[error("malformed hash for '{feed}': {reason}")]
    BadHash { feed: FeedType, reason: String },

    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("store io for '{feed}' at {path}: {source}")]
    Io {
        feed: FeedType,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-feed-type pipeline failures (isolated, reported, never fatal).
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed '{feed}' unavailable: {reason}")]
    Fetch { feed: FeedType, reason: String },

    #[error("failed to parse rows for '{feed}': {reason}")]
    Parse { feed: FeedType, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FeedError {
    pub fn feed(&self) -> Option<FeedType> {
        match self {
            FeedError::Fetch { feed, .. } | FeedError::Parse { feed, .. } => Some(*feed),
            FeedError::Store(StoreError::EmptyIngest { feed })
            | FeedError::Store(StoreError::BadHash { feed, .. })
            | FeedError::Store(StoreError::Io { feed, .. }) => Some(*feed),
            FeedError::Store(StoreError::Corrupt { .. }) => None,
        }
    }
}

/// Run-level failures: the run completed but delivered an incomplete result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("snapshot '{label}' for {date} failed: {reason}")]
    Snapshot {
        label: String,
        date: chrono::NaiveDate,
        reason: String,
    },

    #[error("index rebuild failed: {reason}")]
    Index { reason: String },
}
