//! feed — feed types, row shapes and the collaborator seams.
//!
//! The core never sees raw feed bytes or raw identifiers:
//! - FeedSource produces decompressed bytes (or "unavailable") per feed type.
//! - RowTokenizer turns bytes into raw string triples.
//! - prepare_rows() digests the identifier and parses the numeric fields;
//!   from that point on only the 64-hex digest exists.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::FeedError;

/// The four identifier categories, each with its own independent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeedType {
    Ipv4,
    Ipv6,
    Email,
    Username,
}

impl FeedType {
    pub const ALL: [FeedType; 4] = [
        FeedType::Ipv4,
        FeedType::Ipv6,
        FeedType::Email,
        FeedType::Username,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Ipv4 => "ipv4",
            FeedType::Ipv6 => "ipv6",
            FeedType::Email => "email",
            FeedType::Username => "username",
        }
    }

    /// On-disk tag in the store header (guards against cross-type mixups).
    pub fn tag(&self) -> u8 {
        match self {
            FeedType::Ipv4 => 1,
            FeedType::Ipv6 => 2,
            FeedType::Email => 3,
            FeedType::Username => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<FeedType> {
        match tag {
            1 => Some(FeedType::Ipv4),
            2 => Some(FeedType::Ipv6),
            3 => Some(FeedType::Email),
            4 => Some(FeedType::Username),
            _ => None,
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipv4" => Ok(FeedType::Ipv4),
            "ipv6" => Ok(FeedType::Ipv6),
            "email" => Ok(FeedType::Email),
            "username" => Ok(FeedType::Username),
            other => Err(format!("unknown feed type '{}'", other)),
        }
    }
}

/// Tokenizer output: untyped string triple straight out of a feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub identifier: String,
    pub occurrences: String,
    pub last_seen: String,
}

/// Ingest-ready row: digest instead of the identifier, parsed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub hash: String,
    pub occurrences: u64,
    pub last_seen: i64,
}

/// Supplies raw decompressed feed bytes. Ok(None) means "unavailable this
/// run" — the caller skips the type without touching its store.
pub trait FeedSource: Sync {
    fn fetch(&self, feed: FeedType) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Splits raw bytes into rows. Parse errors surface as a per-type ingestion
/// failure, isolated from other types.
pub trait RowTokenizer: Sync {
    fn tokenize(&self, bytes: &[u8]) -> anyhow::Result<Vec<RawRow>>;
}

/// One-way digest of a raw identifier: lowercase hex SHA-256 over salt+input.
/// The raw identifier must never be stored or logged past this point.
pub fn digest_identifier(identifier: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        // writing to a String cannot fail
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Digest + parse a batch of raw rows. `last_seen` is `YYYY-MM-DD HH:MM:SS`
/// in UTC (the upstream feed format), stored as unix seconds.
pub fn prepare_rows(feed: FeedType, raw: &[RawRow], salt: &str) -> Result<Vec<FeedRow>, FeedError> {
    let mut rows = Vec::with_capacity(raw.len());
    for r in raw {
        let occurrences = r.occurrences.trim().parse::<u64>().map_err(|e| FeedError::Parse {
            feed,
            reason: format!("bad occurrences '{}': {}", r.occurrences, e),
        })?;
        let ts = chrono::NaiveDateTime::parse_from_str(r.last_seen.trim(), "%Y-%m-%d %H:%M:%S")
            .map_err(|e| FeedError::Parse {
                feed,
                reason: format!("bad last-seen '{}': {}", r.last_seen, e),
            })?;
        rows.push(FeedRow {
            hash: digest_identifier(&r.identifier, salt),
            occurrences,
            last_seen: ts.and_utc().timestamp(),
        });
    }
    Ok(rows)
}
