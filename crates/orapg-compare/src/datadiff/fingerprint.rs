//! Row fingerprints and whole-set membership comparison.
//!
//! Each exported row reduces to a SHA-256 digest of its encoded line, so
//! two result sets compare as multisets in O(n) digest lookups instead of
//! O(n²) pairwise row comparison. Only the digests of one side are held in
//! memory; the other side streams against them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::SqlValue;
use crate::error::Result;
use crate::export::encode_value;

/// Fingerprint of one encoded export line.
pub fn line_fingerprint(line: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    hasher.finalize().into()
}

/// Fingerprint of a row of values, via the same encoding the exporter
/// writes, so in-memory rows and exported lines hash identically.
pub fn row_fingerprint(values: &[SqlValue]) -> [u8; 32] {
    let line: Vec<String> = values.iter().map(encode_value).collect();
    line_fingerprint(&line.join(","))
}

/// Outcome of a fingerprint membership comparison of two exported files.
#[derive(Debug, Clone, Default)]
pub struct RowSetDiff {
    /// Data rows on each side (header excluded).
    pub left_rows: u64,
    pub right_rows: u64,

    /// Sample lines present only on the left side (capped).
    pub only_left: Vec<String>,

    /// Sample lines present only on the right side (capped).
    pub only_right: Vec<String>,

    /// Total counts of unmatched rows, beyond the reported samples.
    pub only_left_total: u64,
    pub only_right_total: u64,
}

impl RowSetDiff {
    /// `true` iff the two files contain the same multiset of rows.
    pub fn is_match(&self) -> bool {
        self.only_left_total == 0 && self.only_right_total == 0
    }
}

/// Compare two exported files as multisets of row fingerprints.
///
/// The left file's digests are indexed with multiplicity; the right file
/// streams against the index. Rows left unmatched on either side are
/// reported, with up to `max_reported` sample lines each.
pub fn compare_files_by_fingerprint(
    left: &Path,
    right: &Path,
    max_reported: usize,
) -> Result<RowSetDiff> {
    let mut diff = RowSetDiff::default();

    // Index left digests with multiplicity.
    let mut index: HashMap<[u8; 32], u64> = HashMap::new();
    for line in data_lines(left)? {
        let line = line?;
        *index.entry(line_fingerprint(&line)).or_insert(0) += 1;
        diff.left_rows += 1;
    }

    // Stream the right side against the index.
    for line in data_lines(right)? {
        let line = line?;
        diff.right_rows += 1;
        match index.get_mut(&line_fingerprint(&line)) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                diff.only_right_total += 1;
                if diff.only_right.len() < max_reported {
                    diff.only_right.push(line);
                }
            }
        }
    }

    // Whatever kept a positive count never matched; re-scan the left file
    // to recover sample lines without having held them all in memory.
    diff.only_left_total = index.values().sum();
    if diff.only_left_total > 0 {
        for line in data_lines(left)? {
            let line = line?;
            if let Some(count) = index.get_mut(&line_fingerprint(&line)) {
                if *count > 0 {
                    *count -= 1;
                    diff.only_left.push(line);
                    if diff.only_left.len() >= max_reported {
                        break;
                    }
                }
            }
        }
    }

    Ok(diff)
}

/// Iterator over a file's data lines, skipping the header.
fn data_lines(path: &Path) -> Result<impl Iterator<Item = std::io::Result<String>>> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().skip(1))
}
