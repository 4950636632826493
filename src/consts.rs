//! Shared constants: on-disk names, store format, windowing, retention.

// -------- Snapshot tree --------
pub const INDEX_FILE: &str = "index.json";
pub const FULL_FILE: &str = "full.json";
pub const LOCK_FILE: &str = "LOCK";

/// Number of six-hour slots per UTC day.
pub const DELTA_SLOTS: u8 = 4;

/// Snapshot filename for a delta slot (1..=4). Together with `full.json`
/// these five names are the only ones the retention manifest recognizes.
pub fn delta_file(slot: u8) -> String {
    format!("delta{}.json", slot)
}

// -------- Retention --------
/// Look-back horizon in calendar days, today inclusive.
pub const RETENTION_DAYS: i64 = 15;

// -------- Identifier store --------
// Format of <store_dir>/<feed>.tbl (LE):
// [magic8="FSNAPST1"][ver u32=1][feed u8][count u64]
// count x ([hash 64 ascii bytes][occurrences u64][last_seen i64])
// [crc32 u32] over everything before it.
pub const STORE_MAGIC: &[u8; 8] = b"FSNAPST1";
pub const STORE_VERSION: u32 = 1;
pub const STORE_EXT: &str = "tbl";
pub const STORE_HDR_SIZE: usize = 8 + 4 + 1 + 8;
pub const STORE_REC_SIZE: usize = HASH_HEX_LEN + 8 + 8;

/// Length of a stored digest: lowercase hex of SHA-256.
pub const HASH_HEX_LEN: usize = 64;

// -------- Environment --------
pub const ENV_STORE_DIR: &str = "FEEDSNAP_STORE_DIR";
pub const ENV_SALT: &str = "FEEDSNAP_SALT";
