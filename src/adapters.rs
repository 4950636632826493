//! adapters — replaceable I/O collaborators, outside the core pipeline.
//!
//! - DirFeedSource: reads pre-fetched, decompressed feed files from a local
//!   directory (<dir>/<feed>.csv). Missing file = "unavailable this run".
//!   Network acquisition and archive decompression live outside this crate.
//! - CsvTokenizer: minimal 3-column CSV in the upstream feed shape
//!   (identifier, occurrences, last-seen), double-quote wrapping and
//!   backslash escapes.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::feed::{FeedSource, FeedType, RawRow, RowTokenizer};

pub struct DirFeedSource {
    dir: PathBuf,
}

impl DirFeedSource {
    pub fn new(dir: PathBuf) -> DirFeedSource {
        DirFeedSource { dir }
    }

    pub fn feed_path(&self, feed: FeedType) -> PathBuf {
        self.dir.join(format!("{}.csv", feed))
    }
}

impl FeedSource for DirFeedSource {
    fn fetch(&self, feed: FeedType) -> Result<Option<Vec<u8>>> {
        let path = self.feed_path(feed);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read feed file {}", path.display())),
        }
    }
}

pub struct CsvTokenizer;

impl RowTokenizer for CsvTokenizer {
    fn tokenize(&self, bytes: &[u8]) -> Result<Vec<RawRow>> {
        let text = std::str::from_utf8(bytes).context("feed is not valid utf-8")?;
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_line(line).with_context(|| format!("line {}", lineno + 1))?;
            // Never quote the field contents in errors: column 0 is a raw identifier.
            if fields.len() != 3 {
                bail!("line {}: expected 3 fields, got {}", lineno + 1, fields.len());
            }
            let mut it = fields.into_iter();
            rows.push(RawRow {
                identifier: it.next().unwrap_or_default(),
                occurrences: it.next().unwrap_or_default(),
                last_seen: it.next().unwrap_or_default(),
            });
        }
        Ok(rows)
    }
}

fn split_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    if in_quotes {
        bail!("unterminated quote");
    }
    fields.push(cur);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_plain_and_quoted_rows() -> Result<()> {
        let input = b"198.51.100.7,3,2026-08-22 01:02:03\n\"user@example.org\",\"12\",\"2026-08-21 10:00:00\"\n\n";
        let rows = CsvTokenizer.tokenize(input)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identifier, "198.51.100.7");
        assert_eq!(rows[0].occurrences, "3");
        assert_eq!(rows[1].identifier, "user@example.org");
        assert_eq!(rows[1].last_seen, "2026-08-21 10:00:00");
        Ok(())
    }

    #[test]
    fn tokenize_handles_escapes_and_quoted_commas() -> Result<()> {
        let rows = CsvTokenizer.tokenize(b"\"na\\\"me,with,commas\",1,2026-08-22 00:00:00\n")?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identifier, "na\"me,with,commas");
        Ok(())
    }

    #[test]
    fn tokenize_rejects_wrong_field_count() {
        assert!(CsvTokenizer.tokenize(b"only,two\n").is_err());
        assert!(CsvTokenizer.tokenize(b"a,b,c,d\n").is_err());
        assert!(CsvTokenizer.tokenize(b"\"unterminated,1,2\n").is_err());
    }

    #[test]
    fn missing_feed_file_is_unavailable_not_an_error() -> Result<()> {
        let src = DirFeedSource::new(std::env::temp_dir().join("feedsnap-definitely-missing"));
        assert!(src.fetch(FeedType::Ipv4)?.is_none());
        Ok(())
    }
}
