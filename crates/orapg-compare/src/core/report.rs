//! Structured divergence findings produced by the comparators.
//!
//! Every comparator emits [`ComparisonRow`]s; the rows for one table form a
//! [`TableReport`], and a table's aggregate status is `Error` iff any row is
//! non-OK. Presentation (ANSI colors, HTML markers) is layered on top and is
//! not part of this data contract.

use serde::{Deserialize, Serialize};

/// What a comparison row is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Column,
    Index,
    PrimaryKey,
    ForeignKey,
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Column => write!(f, "column"),
            Subject::Index => write!(f, "index"),
            Subject::PrimaryKey => write!(f, "primary key"),
            Subject::ForeignKey => write!(f, "foreign key"),
        }
    }
}

/// Outcome of a single comparison row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    /// Both sides agree.
    Ok,
    /// Present on both sides but different; carries a short reason.
    Mismatch(String),
    /// Present only on the Postgres side.
    MissingLeft,
    /// Present only on the Oracle side.
    MissingRight,
}

impl RowStatus {
    /// Whether this row counts against the table's aggregate status.
    pub fn is_error(&self) -> bool {
        !matches!(self, RowStatus::Ok)
    }

    /// Short human-readable label.
    pub fn label(&self) -> String {
        match self {
            RowStatus::Ok => "OK".to_string(),
            RowStatus::Mismatch(reason) => reason.clone(),
            RowStatus::MissingLeft => "Missing in Oracle".to_string(),
            RowStatus::MissingRight => "Missing in PostgreSQL".to_string(),
        }
    }
}

/// One finding: a subject, the value seen on each side, and a status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub subject: Subject,

    /// What the row is named after (column name, index name, FK column, or
    /// a synthetic label such as "Index Count").
    pub name: String,

    /// Rendering of the Oracle-side value, if present.
    pub left_value: Option<String>,

    /// Rendering of the Postgres-side value, if present.
    pub right_value: Option<String>,

    pub status: RowStatus,
}

impl ComparisonRow {
    /// Create an OK row.
    pub fn ok(
        subject: Subject,
        name: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            name: name.into(),
            left_value: Some(left.into()),
            right_value: Some(right.into()),
            status: RowStatus::Ok,
        }
    }
}

/// All findings for one table, with the aggregate verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows: Vec<ComparisonRow>,
}

impl TableReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
        }
    }

    /// `false` iff every row is OK.
    pub fn has_errors(&self) -> bool {
        self.rows.iter().any(|r| r.status.is_error())
    }

    /// Rows for one subject, in emission order.
    pub fn rows_for(&self, subject: Subject) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(move |r| r.subject == subject)
    }
}

/// The result of one schema comparison run across a set of tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCompareResult {
    pub tables: Vec<TableReport>,
    pub duration_ms: u64,
}

impl SchemaCompareResult {
    /// Number of tables whose aggregate status is Error.
    pub fn tables_with_errors(&self) -> usize {
        self.tables.iter().filter(|t| t.has_errors()).count()
    }

    /// `true` iff every table aggregated OK.
    pub fn all_ok(&self) -> bool {
        self.tables_with_errors() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_status_is_error_iff_any_row_non_ok() {
        let mut report = TableReport::new("TB_ORDER_HEAD");
        report
            .rows
            .push(ComparisonRow::ok(Subject::Column, "ID", "NUMBER", "integer"));
        assert!(!report.has_errors());

        report.rows.push(ComparisonRow {
            subject: Subject::Index,
            name: "TB_ORDER_I1".into(),
            left_value: Some("[A, B]".into()),
            right_value: None,
            status: RowStatus::MissingRight,
        });
        assert!(report.has_errors());
    }

    #[test]
    fn test_run_result_counts_error_tables() {
        let ok_table = TableReport::new("T1");
        let mut bad_table = TableReport::new("T2");
        bad_table.rows.push(ComparisonRow {
            subject: Subject::PrimaryKey,
            name: "Primary Key".into(),
            left_value: Some("[ID]".into()),
            right_value: Some("[CODE]".into()),
            status: RowStatus::Mismatch("Mismatch".into()),
        });

        let result = SchemaCompareResult {
            tables: vec![ok_table, bad_table],
            duration_ms: 0,
        };
        assert_eq!(result.tables_with_errors(), 1);
        assert!(!result.all_ok());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(RowStatus::Ok.label(), "OK");
        assert_eq!(RowStatus::MissingRight.label(), "Missing in PostgreSQL");
        assert!(RowStatus::Mismatch("Type mismatch".into()).is_error());
    }
}
