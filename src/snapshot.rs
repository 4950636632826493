//! snapshot — assemble and persist one point-in-time aggregate document.
//!
//! The document is a single cross-type unit of delivery: range queries fan
//! out over all four stores and the file is written only after all of them
//! completed. Persisting goes through tmp+rename, so the scheduler's
//! presence check can only see fully durable snapshots.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::FeedType;
use crate::schedule::Window;
use crate::store::HashStore;
use crate::util::atomic_write;

/// hash -> occurrences, ordered by hash for deterministic serialization.
pub type Section = BTreeMap<String, u64>;

#[derive(Debug, Serialize)]
pub struct SnapshotMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub start: String,
    pub end: String,
}

/// Shape on disk: meta first, then one mapping per feed type.
#[derive(Debug, Serialize)]
pub struct SnapshotDocument {
    pub meta: SnapshotMeta,
    pub ipv4: Section,
    pub ipv6: Section,
    pub email: Section,
    pub username: Section,
}

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Build the aggregate document for `window` from all four stores and write
/// it under `<out_dir>/<date>/<file>`. Returns the written path.
pub fn write_snapshot(
    stores: &BTreeMap<FeedType, HashStore>,
    window: &Window,
    out_dir: &Path,
) -> Result<PathBuf> {
    // A snapshot missing one feed type is invalid; check up front.
    for feed in FeedType::ALL {
        if !stores.contains_key(&feed) {
            return Err(anyhow!("store for '{}' is unavailable", feed));
        }
    }

    let (start, end) = (window.start_ts(), window.end_ts());
    let mut sections: BTreeMap<FeedType, Section> = BTreeMap::new();
    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(FeedType::ALL.len());
        for feed in FeedType::ALL {
            let store = &stores[&feed];
            handles.push((
                feed,
                scope.spawn(move || store.range_query(start, end)),
            ));
        }
        for (feed, handle) in handles {
            let section = handle
                .join()
                .map_err(|_| anyhow!("range query worker for '{}' panicked", feed))?;
            sections.insert(feed, section);
        }
        Ok(())
    })?;

    let take = |feed: FeedType, sections: &mut BTreeMap<FeedType, Section>| {
        sections.remove(&feed).unwrap_or_default()
    };
    let doc = SnapshotDocument {
        meta: SnapshotMeta {
            kind: window.kind.label(),
            date: window.date.format("%Y-%m-%d").to_string(),
            start: window.start.format(TS_FORMAT).to_string(),
            end: window.end.format(TS_FORMAT).to_string(),
        },
        ipv4: take(FeedType::Ipv4, &mut sections),
        ipv6: take(FeedType::Ipv6, &mut sections),
        email: take(FeedType::Email, &mut sections),
        username: take(FeedType::Username, &mut sections),
    };

    let dir = window.dir(out_dir);
    fs::create_dir_all(&dir).with_context(|| format!("create snapshot dir {}", dir.display()))?;

    let path = window.target_path(out_dir);
    let mut bytes = serde_json::to_vec_pretty(&doc).context("serialize snapshot document")?;
    bytes.push(b'\n');
    atomic_write(&path, &bytes).with_context(|| format!("write snapshot {}", path.display()))?;
    Ok(path)
}
