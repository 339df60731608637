//! Ordered positional comparison of two exported files.
//!
//! When both sides were exported under the same stable ordering, the files
//! diff positionally: a streamed whole-file digest settles the identical
//! case without a line-level pass, differing row counts short-circuit, and
//! otherwise the files are walked in lock-step, reporting line pairs that
//! differ up to a cap.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::Result;

/// One differing line pair (1-based line number including the header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff {
    pub line_number: u64,
    pub left: String,
    pub right: String,
}

/// Outcome of a positional file comparison.
#[derive(Debug, Clone, Default)]
pub struct FileDiffReport {
    /// Byte-identical shortcut hit.
    pub identical: bool,

    /// Data rows per side (header excluded).
    pub left_rows: u64,
    pub right_rows: u64,

    /// Differing line pairs, capped at the configured maximum.
    pub differences: Vec<LineDiff>,

    /// More differences exist beyond the reported ones.
    pub truncated: bool,
}

impl FileDiffReport {
    /// `true` iff the files carry the same rows in the same order.
    pub fn is_match(&self) -> bool {
        self.identical || (self.left_rows == self.right_rows && self.differences.is_empty())
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        if self.identical {
            "Files are identical (digest match)".to_string()
        } else if self.left_rows != self.right_rows {
            format!(
                "Files have different row counts: {} vs {}",
                self.left_rows, self.right_rows
            )
        } else if self.differences.is_empty() {
            "Files have same content".to_string()
        } else {
            format!(
                "Files differ on {}{} lines",
                self.differences.len(),
                if self.truncated { "+" } else { "" }
            )
        }
    }
}

/// Compare two exported files positionally.
pub fn compare_files_positional(
    left: &Path,
    right: &Path,
    max_reported: usize,
) -> Result<FileDiffReport> {
    let mut report = FileDiffReport::default();

    if file_digest(left)? == file_digest(right)? {
        report.identical = true;
        info!("files identical by digest");
        return Ok(report);
    }

    report.left_rows = count_data_rows(left)?;
    report.right_rows = count_data_rows(right)?;
    if report.left_rows != report.right_rows {
        return Ok(report);
    }

    let left_reader = BufReader::new(File::open(left)?);
    let right_reader = BufReader::new(File::open(right)?);
    let mut line_number: u64 = 1; // header
    for (l, r) in left_reader.lines().skip(1).zip(right_reader.lines().skip(1)) {
        line_number += 1;
        let l = l?;
        let r = r?;
        if l != r {
            if report.differences.len() >= max_reported {
                report.truncated = true;
                break;
            }
            report.differences.push(LineDiff {
                line_number,
                left: l,
                right: r,
            });
        }
    }

    Ok(report)
}

/// Streamed SHA-256 of a whole file.
fn file_digest(path: &Path) -> Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

fn count_data_rows(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().skip(1).count() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_identical_files_shortcut() {
        let dir = tempfile::tempdir().unwrap();
        let left = write_file(dir.path(), "l.csv", &["id,name", "1,a"]);
        let right = write_file(dir.path(), "r.csv", &["id,name", "1,a"]);

        let report = compare_files_positional(&left, &right, 10).unwrap();
        assert!(report.identical);
        assert!(report.is_match());
    }

    #[test]
    fn test_row_count_mismatch_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let left = write_file(dir.path(), "l.csv", &["id", "1", "2"]);
        let right = write_file(dir.path(), "r.csv", &["id", "1"]);

        let report = compare_files_positional(&left, &right, 10).unwrap();
        assert!(!report.is_match());
        assert_eq!(report.left_rows, 2);
        assert_eq!(report.right_rows, 1);
        assert!(report.differences.is_empty());
        assert!(report.summary().contains("different row counts"));
    }

    #[test]
    fn test_line_differences_reported_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let left = write_file(dir.path(), "l.csv", &["id,v", "1,a", "2,b", "3,c"]);
        let right = write_file(dir.path(), "r.csv", &["id,v", "1,a", "2,X", "3,c"]);

        let report = compare_files_positional(&left, &right, 10).unwrap();
        assert_eq!(report.differences.len(), 1);
        // Header is line 1, first data row line 2.
        assert_eq!(report.differences[0].line_number, 3);
        assert_eq!(report.differences[0].left, "2,b");
        assert_eq!(report.differences[0].right, "2,X");
    }

    #[test]
    fn test_difference_cap() {
        let dir = tempfile::tempdir().unwrap();
        let left = write_file(dir.path(), "l.csv", &["id", "1", "2", "3"]);
        let right = write_file(dir.path(), "r.csv", &["id", "9", "8", "7"]);

        let report = compare_files_positional(&left, &right, 2).unwrap();
        assert_eq!(report.differences.len(), 2);
        assert!(report.truncated);
    }
}
