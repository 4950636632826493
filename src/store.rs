//! store — per-feed-type durable table of identifier digests.
//!
//! One HashStore per feed type; no two types share a file. Semantics:
//! - upsert_all: last-write-wins by hash, whole batch applied atomically
//!   (never observable half-applied), empty batches rejected.
//! - range_query: records with last_seen in [start, end] inclusive, ordered
//!   by hash.
//! - garbage_collect: full-replace — drops every hash absent from the last
//!   ingested batch of this run.
//!
//! On-disk format (see consts.rs): magic + version + feed tag + LE records +
//! crc32 trailer, written via tmp+rename. A load failure is a typed Corrupt
//! error, never a silent reset.

use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{
    HASH_HEX_LEN, STORE_EXT, STORE_HDR_SIZE, STORE_MAGIC, STORE_REC_SIZE, STORE_VERSION,
};
use crate::error::StoreError;
use crate::feed::{FeedRow, FeedType};

/// Stored value for one hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub occurrences: u64,
    pub last_seen: i64,
}

pub struct HashStore {
    feed: FeedType,
    path: PathBuf,
    records: BTreeMap<String, Entry>,
    /// Hash set of the last batch ingested in this run; GC keeps only these.
    live: Option<BTreeSet<String>>,
}

impl HashStore {
    /// Open (and create if absent) the store for one feed type. Idempotent:
    /// an existing table is loaded, a missing one starts empty.
    pub fn open(dir: &Path, feed: FeedType) -> Result<HashStore, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            feed,
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(format!("{}.{}", feed, STORE_EXT));
        let records = if path.exists() {
            load_table(&path, feed)?
        } else {
            BTreeMap::new()
        };
        Ok(HashStore {
            feed,
            path,
            records,
            live: None,
        })
    }

    pub fn feed(&self) -> FeedType {
        self.feed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full dump, ordered by hash.
    pub fn records(&self) -> &BTreeMap<String, Entry> {
        &self.records
    }

    /// Insert-or-replace the whole batch, keyed by hash. The previous value
    /// of occurrences/last_seen is overwritten, never accumulated. The batch
    /// is validated and persisted before the in-memory table is swapped, so
    /// a failure leaves the store exactly as it was.
    pub fn upsert_all(&mut self, rows: &[FeedRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Err(StoreError::EmptyIngest { feed: self.feed });
        }
        for row in rows {
            validate_hash(self.feed, &row.hash)?;
        }

        let mut next = self.records.clone();
        let mut live = BTreeSet::new();
        for row in rows {
            next.insert(
                row.hash.clone(),
                Entry {
                    occurrences: row.occurrences,
                    last_seen: row.last_seen,
                },
            );
            live.insert(row.hash.clone());
        }

        self.persist(&next)?;
        self.records = next;
        self.live = Some(live);
        Ok(rows.len())
    }

    /// Every record with last_seen in [start, end] inclusive. last_seen is
    /// dropped from the result — the consumer knows the window already.
    pub fn range_query(&self, start: i64, end: i64) -> BTreeMap<String, u64> {
        self.records
            .iter()
            .filter(|(_, e)| e.last_seen >= start && e.last_seen <= end)
            .map(|(hash, e)| (hash.clone(), e.occurrences))
            .collect()
    }

    /// Drop records whose hash was absent from the last upsert_all batch.
    /// No-op (Ok(0)) when nothing was ingested this run. Returns the number
    /// of removed records.
    pub fn garbage_collect(&mut self) -> Result<usize, StoreError> {
        let live = match &self.live {
            Some(live) => live,
            None => return Ok(0),
        };
        let next: BTreeMap<String, Entry> = self
            .records
            .iter()
            .filter(|(hash, _)| live.contains(hash.as_str()))
            .map(|(h, e)| (h.clone(), *e))
            .collect();
        let removed = self.records.len() - next.len();
        if removed > 0 {
            self.persist(&next)?;
            self.records = next;
        }
        Ok(removed)
    }

    fn persist(&self, records: &BTreeMap<String, Entry>) -> Result<(), StoreError> {
        let mut buf: Vec<u8> =
            Vec::with_capacity(STORE_HDR_SIZE + records.len() * STORE_REC_SIZE + 4);
        buf.extend_from_slice(STORE_MAGIC);
        // writes into a Vec cannot fail
        let _ = buf.write_u32::<LittleEndian>(STORE_VERSION);
        let _ = buf.write_u8(self.feed.tag());
        let _ = buf.write_u64::<LittleEndian>(records.len() as u64);
        for (hash, entry) in records {
            buf.extend_from_slice(hash.as_bytes());
            let _ = buf.write_u64::<LittleEndian>(entry.occurrences);
            let _ = buf.write_i64::<LittleEndian>(entry.last_seen);
        }
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();
        let _ = buf.write_u32::<LittleEndian>(crc);

        crate::util::atomic_write(&self.path, &buf).map_err(|e| StoreError::Io {
            feed: self.feed,
            path: self.path.clone(),
            source: e,
        })
    }
}

fn validate_hash(feed: FeedType, hash: &str) -> Result<(), StoreError> {
    let ok = hash.len() == HASH_HEX_LEN
        && hash
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::BadHash {
            feed,
            reason: format!("expected {} lowercase hex chars", HASH_HEX_LEN),
        })
    }
}

fn load_table(path: &Path, feed: FeedType) -> Result<BTreeMap<String, Entry>, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::Io {
        feed,
        path: path.to_path_buf(),
        source: e,
    })?;
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < STORE_HDR_SIZE + 4 {
        return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
    }
    if &bytes[0..8] != STORE_MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != STORE_VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }
    let tag = bytes[12];
    if tag != feed.tag() {
        return Err(corrupt(format!(
            "feed tag mismatch: file has {}, expected {} ('{}')",
            tag,
            feed.tag(),
            feed
        )));
    }
    let count = u64::from_le_bytes([
        bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19], bytes[20],
    ]) as usize;
    let expected = STORE_HDR_SIZE + count * STORE_REC_SIZE + 4;
    if bytes.len() != expected {
        return Err(corrupt(format!(
            "length mismatch: {} bytes, expected {} for {} records",
            bytes.len(),
            expected,
            count
        )));
    }

    let body_end = bytes.len() - 4;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[..body_end]);
    let crc_stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    if hasher.finalize() != crc_stored {
        return Err(corrupt("crc mismatch".into()));
    }

    let mut records = BTreeMap::new();
    let mut off = STORE_HDR_SIZE;
    for _ in 0..count {
        let hash = std::str::from_utf8(&bytes[off..off + HASH_HEX_LEN])
            .map_err(|_| corrupt("non-utf8 hash field".into()))?
            .to_string();
        off += HASH_HEX_LEN;
        let occurrences = u64::from_le_bytes([
            bytes[off],
            bytes[off + 1],
            bytes[off + 2],
            bytes[off + 3],
            bytes[off + 4],
            bytes[off + 5],
            bytes[off + 6],
            bytes[off + 7],
        ]);
        off += 8;
        let last_seen = i64::from_le_bytes([
            bytes[off],
            bytes[off + 1],
            bytes[off + 2],
            bytes[off + 3],
            bytes[off + 4],
            bytes[off + 5],
            bytes[off + 6],
            bytes[off + 7],
        ]);
        off += 8;
        records.insert(
            hash,
            Entry {
                occurrences,
                last_seen,
            },
        );
    }
    Ok(records)
}
