//! Streaming result exporter.
//!
//! Writes one comma-delimited UTF-8 line per row, accumulating a fixed
//! number of formatted lines per write so peak memory is bounded no matter
//! how large the result set is. Plain CSV cannot distinguish NULL from an
//! empty string, so both are replaced with sentinel tokens; an embedded
//! comma is backslash-escaped and embedded line breaks collapse to a
//! single space.
//!
//! Failures abort the export for that side and are reported, never
//! retried. Partially written files stay on disk; cleanup is the caller's
//! policy.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use tracing::{info, warn};

use crate::core::{Engine, SqlValue};
use crate::db::QueryStream;
use crate::error::{CompareError, Result};

/// Sentinel written for SQL NULL.
pub const NULL_SENTINEL: &str = "<<NULL>>";

/// Sentinel written for a zero-length string (distinct from NULL).
pub const EMPTY_SENTINEL: &str = "<<EMPTY>>";

/// Outcome of a completed export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub duration_ms: u64,
}

/// Render one value for export.
///
/// Substitutions, in order: NULL becomes [`NULL_SENTINEL`]; an empty string
/// becomes [`EMPTY_SENTINEL`]; commas are escaped with a backslash; CR/LF
/// collapse to a single space. Float and decimal renderings carry no
/// trailing zeros (see [`SqlValue::render`]).
pub fn encode_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => NULL_SENTINEL.to_string(),
        SqlValue::Text(s) if s.is_empty() => EMPTY_SENTINEL.to_string(),
        other => escape_field(&other.render()),
    }
}

/// Escape an already-rendered field: commas and line breaks only.
pub fn escape_field(s: &str) -> String {
    s.replace(',', "\\,").replace(['\n', '\r'], " ")
}

/// Invert [`encode_value`] for one field: `None` means SQL NULL.
pub fn decode_field(field: &str) -> Option<String> {
    match field {
        NULL_SENTINEL => None,
        EMPTY_SENTINEL => Some(String::new()),
        other => Some(other.replace("\\,", ",")),
    }
}

/// Split an exported line on unescaped commas, keeping fields raw
/// (sentinels and escapes intact).
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if escaped {
        current.push('\\');
    }
    fields.push(current);
    fields
}

/// Split and decode an exported line back into values (`None` = NULL).
pub fn parse_line(line: &str) -> Vec<Option<String>> {
    split_line(line)
        .iter()
        .map(|f| decode_field(f))
        .collect()
}

/// Streaming exporter bound to a working directory and a batch size.
#[derive(Debug, Clone)]
pub struct Exporter {
    work_dir: PathBuf,
    batch_size: usize,
}

impl Exporter {
    pub fn new(work_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            work_dir: work_dir.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Output path for one side: `<work_dir>/query/<tag>/<tag>_query_results_<ts>.csv`.
    pub fn target_path(&self, tag: &str) -> PathBuf {
        let filename = format!(
            "{}_query_results_{}.csv",
            tag,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        self.work_dir.join("query").join(tag).join(filename)
    }

    /// Stream a result set to `path`.
    ///
    /// The header line carries the stream's lower-cased column names.
    pub async fn export_stream(
        &self,
        mut stream: QueryStream,
        engine: Engine,
        path: &Path,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        let mut writer = self.open(engine, path)?;

        writeln!(writer, "{}", stream.columns.join(","))
            .map_err(|e| CompareError::export(engine, e))?;

        let mut batch: Vec<String> = Vec::with_capacity(self.batch_size.min(64 * 1024));
        let mut rows: u64 = 0;
        while let Some(row_batch) = stream.next_batch().await {
            for row in row_batch? {
                let line: Vec<String> = row.iter().map(encode_value).collect();
                batch.push(line.join(","));
                if batch.len() >= self.batch_size {
                    rows += flush(&mut writer, &mut batch, engine)?;
                    info!(engine = engine.tag(), rows, "export progress");
                }
            }
        }
        if !batch.is_empty() {
            rows += flush(&mut writer, &mut batch, engine)?;
        }
        writer.flush().map_err(|e| CompareError::export(engine, e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            engine = engine.tag(),
            rows,
            duration_ms,
            path = %path.display(),
            "export complete"
        );
        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows,
            duration_ms,
        })
    }

    /// Export rows already materialized in memory (the sample flow's
    /// result sets are at most a handful of rows).
    pub fn export_rows(
        &self,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        engine: Engine,
        path: &Path,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        let mut writer = self.open(engine, path)?;

        writeln!(writer, "{}", columns.join(","))
            .map_err(|e| CompareError::export(engine, e))?;

        let mut batch: Vec<String> = Vec::with_capacity(rows.len().min(self.batch_size));
        let mut written: u64 = 0;
        for row in rows {
            let line: Vec<String> = row.iter().map(encode_value).collect();
            batch.push(line.join(","));
            if batch.len() >= self.batch_size {
                written += flush(&mut writer, &mut batch, engine)?;
            }
        }
        if !batch.is_empty() {
            written += flush(&mut writer, &mut batch, engine)?;
        }
        writer.flush().map_err(|e| CompareError::export(engine, e))?;

        info!(engine = engine.tag(), rows = written, path = %path.display(), "export complete");
        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows: written,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Single accumulated-row mode for procedural output.
    ///
    /// Each input line has the form `column: value`; repeated lines build
    /// one logical row with columns in first-seen order. A value of `NULL`
    /// or an empty value is written as the NULL sentinel.
    pub fn export_accumulated(
        &self,
        lines: &[String],
        engine: Engine,
        path: &Path,
    ) -> Result<ExportSummary> {
        let start = Instant::now();

        let mut columns: Vec<String> = Vec::new();
        let mut row_data: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();
        let mut parsed: u64 = 0;

        for line in lines {
            let Some((col, value)) = split_output_line(line) else {
                warn!(line = %line, "skipping invalid procedural output line");
                continue;
            };
            if !columns.iter().any(|c| c == &col) {
                columns.push(col.clone());
            }
            let encoded = if value == "NULL" || value.is_empty() {
                NULL_SENTINEL.to_string()
            } else {
                escape_field(&value)
            };
            row_data.insert(col, encoded);
            parsed += 1;
        }

        if columns.is_empty() {
            return Err(CompareError::export(
                engine,
                "no valid procedural output lines found",
            ));
        }

        let mut writer = self.open(engine, path)?;
        writeln!(writer, "{}", columns.join(","))
            .map_err(|e| CompareError::export(engine, e))?;
        let row: Vec<String> = columns
            .iter()
            .map(|c| row_data.get(c).cloned().unwrap_or_else(|| NULL_SENTINEL.to_string()))
            .collect();
        writeln!(writer, "{}", row.join(",")).map_err(|e| CompareError::export(engine, e))?;
        writer.flush().map_err(|e| CompareError::export(engine, e))?;

        info!(engine = engine.tag(), values = parsed, "accumulated export complete");
        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows: 1,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn open(&self, engine: Engine, path: &Path) -> Result<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompareError::export(engine, e))?;
        }
        let file = File::create(path).map_err(|e| CompareError::export(engine, e))?;
        Ok(BufWriter::new(file))
    }
}

/// One write per accumulated batch.
fn flush(
    writer: &mut BufWriter<File>,
    batch: &mut Vec<String>,
    engine: Engine,
) -> Result<u64> {
    let count = batch.len() as u64;
    writer
        .write_all(batch.join("\n").as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .map_err(|e| CompareError::export(engine, e))?;
    batch.clear();
    Ok(count)
}

/// Split a `column: value` procedural output line on the first colon,
/// tolerating variable whitespace after it.
fn split_output_line(line: &str) -> Option<(String, String)> {
    let (col, value) = line.split_once(':')?;
    if col.is_empty() {
        return None;
    }
    Some((col.to_string(), value.trim_start().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_value_sentinels() {
        assert_eq!(encode_value(&SqlValue::Null), "<<NULL>>");
        assert_eq!(encode_value(&SqlValue::Text(String::new())), "<<EMPTY>>");
        assert_eq!(encode_value(&SqlValue::Text("plain".into())), "plain");
    }

    #[test]
    fn test_encode_value_escapes() {
        assert_eq!(encode_value(&SqlValue::Text("a,b".into())), "a\\,b");
        assert_eq!(encode_value(&SqlValue::Text("a\nb\rc".into())), "a b c");
    }

    #[test]
    fn test_round_trip_fields() {
        for original in ["plain", "a,b", "with  spaces"] {
            let encoded = escape_field(original);
            assert_eq!(decode_field(&encoded).as_deref(), Some(original));
        }
        assert_eq!(decode_field(NULL_SENTINEL), None);
        assert_eq!(decode_field(EMPTY_SENTINEL).as_deref(), Some(""));
    }

    #[test]
    fn test_split_line_respects_escapes() {
        let fields = split_line("a\\,b,<<NULL>>,c");
        assert_eq!(fields, vec!["a\\,b", "<<NULL>>", "c"]);

        let parsed = parse_line("a\\,b,<<NULL>>,<<EMPTY>>");
        assert_eq!(
            parsed,
            vec![Some("a,b".to_string()), None, Some(String::new())]
        );
    }

    #[test]
    fn test_round_trip_rows() {
        // A NULL, an empty string, and a comma-bearing value reconstruct
        // exactly after encode + parse.
        let rows = [
            vec![
                SqlValue::Null,
                SqlValue::Text(String::new()),
                SqlValue::Text("x,y".into()),
            ],
            vec![
                SqlValue::Text("plain".into()),
                SqlValue::Int(42),
                SqlValue::Null,
            ],
        ];

        for row in &rows {
            let line = row.iter().map(encode_value).collect::<Vec<_>>().join(",");
            let parsed = parse_line(&line);
            assert_eq!(parsed.len(), row.len());
            for (value, field) in row.iter().zip(&parsed) {
                match value {
                    SqlValue::Null => assert!(field.is_none()),
                    other => assert_eq!(field.as_deref(), Some(other.render().as_str())),
                }
            }
        }
    }

    #[test]
    fn test_split_output_line() {
        assert_eq!(
            split_output_line("name:   Alice"),
            Some(("name".to_string(), "Alice".to_string()))
        );
        assert_eq!(split_output_line("no separator"), None);
    }

    #[tokio::test]
    async fn test_export_stream_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), 2); // tiny batches on purpose
        let path = dir.path().join("rows.csv");

        let rows = vec![
            vec![SqlValue::Int(1), SqlValue::Null, SqlValue::Text("a,b".into())],
            vec![
                SqlValue::Int(2),
                SqlValue::Text(String::new()),
                SqlValue::Text("line\nbreak".into()),
            ],
            vec![
                SqlValue::Int(3),
                SqlValue::Decimal(rust_decimal::Decimal::new(1500, 2)), // 15.00
                SqlValue::Text("plain".into()),
            ],
        ];

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(rows.clone())).await.unwrap();
        drop(tx);
        let stream = crate::db::QueryStream::new(
            vec!["id".into(), "amount".into(), "note".into()],
            rx,
        );

        let summary = exporter
            .export_stream(stream, Engine::Postgres, &path)
            .await
            .unwrap();
        assert_eq!(summary.rows, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id,amount,note"));

        // Re-parsing with sentinel substitution and comma un-escaping
        // reconstructs the original rows exactly.
        let parsed: Vec<Vec<Option<String>>> = lines.map(parse_line).collect();
        assert_eq!(
            parsed,
            vec![
                vec![Some("1".into()), None, Some("a,b".into())],
                vec![Some("2".into()), Some("".into()), Some("line break".into())],
                vec![Some("3".into()), Some("15".into()), Some("plain".into())],
            ]
        );
    }

    #[test]
    fn test_export_accumulated() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), 50_000);
        let path = dir.path().join("out.csv");

        let lines = vec![
            "id: 7".to_string(),
            "name: Alice".to_string(),
            "note: NULL".to_string(),
        ];
        let summary = exporter
            .export_accumulated(&lines, Engine::Oracle, &path)
            .unwrap();
        assert_eq!(summary.rows, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id,name,note"));
        assert_eq!(lines.next(), Some("7,Alice,<<NULL>>"));
    }
}
