//! Run configuration, collected in one place instead of scattered lookups.
//!
//! One required value (the snapshot output directory), two optional ones:
//! the identifier-store location (default <out_dir>/store) and the digest
//! salt (default empty — plain SHA-256). Env fallbacks apply when the CLI
//! did not set the value: FEEDSNAP_STORE_DIR, FEEDSNAP_SALT.

use std::path::PathBuf;

use crate::consts::{ENV_SALT, ENV_STORE_DIR};

#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot root: date directories, index.json, LOCK.
    pub out_dir: PathBuf,
    /// Where the per-type identifier tables live.
    pub store_dir: PathBuf,
    /// Prepended to every identifier before hashing.
    pub salt: String,
}

impl Config {
    pub fn new(out_dir: PathBuf, store_dir: Option<PathBuf>, salt: Option<String>) -> Config {
        let store_dir = store_dir
            .or_else(|| std::env::var(ENV_STORE_DIR).ok().map(PathBuf::from))
            .unwrap_or_else(|| out_dir.join("store"));
        let salt = salt
            .or_else(|| std::env::var(ENV_SALT).ok())
            .unwrap_or_default();
        Config {
            out_dir,
            store_dir,
            salt,
        }
    }
}
