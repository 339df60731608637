//! Schema comparator.
//!
//! For each named table, fetches column, index, primary-key, and
//! foreign-key metadata from both engines (concurrently), joins the two
//! sides on upper-cased names, and emits one [`ComparisonRow`] per
//! finding. A table's aggregate status is Error iff any row is non-OK.

use std::collections::BTreeMap;

use tracing::info;

use crate::core::report::{ComparisonRow, RowStatus, Subject, TableReport};
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableSchema};
use crate::db::SchemaSource;
use crate::error::Result;
use crate::typemap;

/// Compare one table across both engines.
pub async fn compare_table(
    oracle: &dyn SchemaSource,
    postgres: &dyn SchemaSource,
    table: &str,
) -> Result<TableReport> {
    info!(table = %table, "comparing table schema");

    let (left, right) = tokio::join!(
        oracle.fetch_table_schema(table),
        postgres.fetch_table_schema(table)
    );
    let left = left?;
    let right = right?;

    Ok(build_report(table, &left, &right))
}

/// Assemble the full report from both sides' metadata.
pub fn build_report(table: &str, left: &TableSchema, right: &TableSchema) -> TableReport {
    let mut report = TableReport::new(table);
    report.rows.extend(compare_columns(&left.columns, &right.columns));
    report.rows.extend(compare_indexes(&left.indexes, &right.indexes));
    report
        .rows
        .push(compare_primary_key(&left.primary_key, &right.primary_key));
    report
        .rows
        .extend(compare_foreign_keys(&left.foreign_keys, &right.foreign_keys));
    report
}

/// Column comparison: every Oracle column is looked up by upper-cased name
/// on the Postgres side, its expected target type computed from the type
/// map, and character lengths compared for character targets.
pub fn compare_columns(
    left: &BTreeMap<String, ColumnInfo>,
    right: &BTreeMap<String, ColumnInfo>,
) -> Vec<ComparisonRow> {
    let mut rows = Vec::new();

    for (name, ora) in left {
        let expected = typemap::oracle_to_postgres(&ora.engine_type, ora.precision, ora.scale);
        let left_value = render_column(ora);

        let Some(pg) = right.get(name) else {
            rows.push(ComparisonRow {
                subject: Subject::Column,
                name: name.clone(),
                left_value: Some(left_value),
                right_value: None,
                status: RowStatus::MissingRight,
            });
            continue;
        };

        let right_value = render_column(pg);
        let status = match &expected {
            None => RowStatus::Mismatch(format!(
                "No mapping for Oracle type {}",
                ora.engine_type
            )),
            Some(expected_type) if expected_type != &pg.engine_type => RowStatus::Mismatch(
                format!("Type mismatch (expected {})", expected_type),
            ),
            Some(expected_type)
                if typemap::is_character_type(expected_type) && ora.length != pg.length =>
            {
                RowStatus::Mismatch(format!(
                    "Length mismatch (Oracle: {}, PG: {})",
                    render_length(ora.length),
                    render_length(pg.length)
                ))
            }
            Some(_) => RowStatus::Ok,
        };

        rows.push(ComparisonRow {
            subject: Subject::Column,
            name: name.clone(),
            left_value: Some(left_value),
            right_value: Some(right_value),
            status,
        });
    }

    rows
}

/// Index comparison over the union of normalized index names, plus one
/// total-count row. Column membership is compared order-insensitively.
pub fn compare_indexes(
    left: &BTreeMap<String, IndexInfo>,
    right: &BTreeMap<String, IndexInfo>,
) -> Vec<ComparisonRow> {
    let mut rows = vec![count_row(
        Subject::Index,
        "Index Count",
        left.len(),
        right.len(),
    )];

    let mut names: Vec<&String> = left.keys().chain(right.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        let row = match (left.get(name), right.get(name)) {
            (Some(l), None) => ComparisonRow {
                subject: Subject::Index,
                name: name.clone(),
                left_value: Some(render_columns(&l.columns)),
                right_value: None,
                status: RowStatus::MissingRight,
            },
            (None, Some(r)) => ComparisonRow {
                subject: Subject::Index,
                name: name.clone(),
                left_value: None,
                right_value: Some(render_columns(&r.columns)),
                status: RowStatus::MissingLeft,
            },
            (Some(l), Some(r)) => {
                let mut l_cols = l.columns.clone();
                let mut r_cols = r.columns.clone();
                l_cols.sort();
                r_cols.sort();
                let status = if l_cols == r_cols {
                    RowStatus::Ok
                } else {
                    RowStatus::Mismatch("Column order/membership mismatch".to_string())
                };
                ComparisonRow {
                    subject: Subject::Index,
                    name: name.clone(),
                    left_value: Some(render_columns(&l.columns)),
                    right_value: Some(render_columns(&r.columns)),
                    status,
                }
            }
            (None, None) => unreachable!("name came from one of the maps"),
        };
        rows.push(row);
    }

    rows
}

/// Primary keys compare as ordered lists: membership or order differences
/// are both mismatches.
pub fn compare_primary_key(left: &[String], right: &[String]) -> ComparisonRow {
    let status = if left == right {
        RowStatus::Ok
    } else {
        RowStatus::Mismatch("Mismatch".to_string())
    };
    ComparisonRow {
        subject: Subject::PrimaryKey,
        name: "Primary Key".to_string(),
        left_value: Some(render_columns(left)),
        right_value: Some(render_columns(right)),
        status,
    }
}

/// Foreign keys compare as a structural set of (column, referenced table,
/// referenced column) edges, with a total-count row first.
pub fn compare_foreign_keys(
    left: &[ForeignKeyInfo],
    right: &[ForeignKeyInfo],
) -> Vec<ComparisonRow> {
    let mut rows = vec![count_row(
        Subject::ForeignKey,
        "Foreign Key Count",
        left.len(),
        right.len(),
    )];

    for fk in left {
        if right.contains(fk) {
            rows.push(ComparisonRow::ok(
                Subject::ForeignKey,
                fk.column.clone(),
                fk.referenced(),
                fk.referenced(),
            ));
        } else {
            rows.push(ComparisonRow {
                subject: Subject::ForeignKey,
                name: fk.column.clone(),
                left_value: Some(fk.referenced()),
                right_value: None,
                status: RowStatus::MissingRight,
            });
        }
    }

    for fk in right {
        if !left.contains(fk) {
            rows.push(ComparisonRow {
                subject: Subject::ForeignKey,
                name: fk.column.clone(),
                left_value: None,
                right_value: Some(fk.referenced()),
                status: RowStatus::MissingLeft,
            });
        }
    }

    rows
}

fn count_row(subject: Subject, name: &str, left: usize, right: usize) -> ComparisonRow {
    ComparisonRow {
        subject,
        name: name.to_string(),
        left_value: Some(left.to_string()),
        right_value: Some(right.to_string()),
        status: if left == right {
            RowStatus::Ok
        } else {
            RowStatus::Mismatch("Mismatch".to_string())
        },
    }
}

fn render_column(col: &ColumnInfo) -> String {
    match col.length {
        Some(len) if len > 0 => format!("{}({})", col.engine_type, len),
        _ => col.engine_type.clone(),
    }
}

fn render_columns(cols: &[String]) -> String {
    format!("[{}]", cols.join(", "))
}

fn render_length(len: Option<i32>) -> String {
    match len {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, engine_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            engine_type: engine_type.to_string(),
            length: None,
            precision: None,
            scale: None,
        }
    }

    fn col_map(cols: Vec<ColumnInfo>) -> BTreeMap<String, ColumnInfo> {
        cols.into_iter().map(|c| (c.name.clone(), c)).collect()
    }

    fn index(name: &str, columns: &[&str]) -> IndexInfo {
        IndexInfo {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn index_map(indexes: Vec<IndexInfo>) -> BTreeMap<String, IndexInfo> {
        indexes.into_iter().map(|i| (i.name.clone(), i)).collect()
    }

    fn fk(column: &str, table: &str, ref_column: &str) -> ForeignKeyInfo {
        ForeignKeyInfo {
            column: column.to_string(),
            referenced_table: table.to_string(),
            referenced_column: ref_column.to_string(),
        }
    }

    #[test]
    fn test_column_missing_in_postgres() {
        let left = col_map(vec![col("ID", "NUMBER")]);
        let right = BTreeMap::new();
        let rows = compare_columns(&left, &right);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RowStatus::MissingRight);
    }

    #[test]
    fn test_column_type_match_via_mapping() {
        let mut ora = col("ID", "NUMBER");
        ora.precision = Some(9);
        let left = col_map(vec![ora]);
        let right = col_map(vec![col("ID", "integer")]);

        let rows = compare_columns(&left, &right);
        assert_eq!(rows[0].status, RowStatus::Ok);
    }

    #[test]
    fn test_column_type_mismatch_reports_expected() {
        let mut ora = col("ID", "NUMBER");
        ora.precision = Some(20);
        let left = col_map(vec![ora]);
        let right = col_map(vec![col("ID", "integer")]);

        let rows = compare_columns(&left, &right);
        match &rows[0].status {
            RowStatus::Mismatch(reason) => assert!(reason.contains("expected numeric")),
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_column_length_mismatch_for_character_types() {
        let mut ora = col("NAME", "VARCHAR2");
        ora.length = Some(30);
        let left = col_map(vec![ora]);
        let mut pg = col("NAME", "character varying");
        pg.length = Some(60);
        let right = col_map(vec![pg]);

        let rows = compare_columns(&left, &right);
        match &rows[0].status {
            RowStatus::Mismatch(reason) => {
                assert!(reason.contains("Oracle: 30"));
                assert!(reason.contains("PG: 60"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_index_membership_mismatch_same_cardinality() {
        // Left [A, B] vs right [B, C]: same length, different sets.
        let left = index_map(vec![index("TB_I1", &["A", "B"])]);
        let right = index_map(vec![index("TB_I1", &["B", "C"])]);

        let rows = compare_indexes(&left, &right);
        assert_eq!(rows[0].status, RowStatus::Ok); // count row
        assert!(matches!(rows[1].status, RowStatus::Mismatch(_)));
    }

    #[test]
    fn test_index_order_insensitive_on_membership() {
        let left = index_map(vec![index("TB_I1", &["A", "B"])]);
        let right = index_map(vec![index("TB_I1", &["B", "A"])]);

        let rows = compare_indexes(&left, &right);
        assert_eq!(rows[1].status, RowStatus::Ok);
    }

    #[test]
    fn test_index_missing_sides_and_count() {
        let left = index_map(vec![index("ONLY_LEFT", &["A"])]);
        let right = index_map(vec![
            index("ONLY_RIGHT", &["B"]),
            index("ALSO_RIGHT", &["C"]),
        ]);

        let rows = compare_indexes(&left, &right);
        // Count row 1 vs 2 mismatches.
        assert!(matches!(rows[0].status, RowStatus::Mismatch(_)));
        let missing_right = rows
            .iter()
            .filter(|r| r.status == RowStatus::MissingRight)
            .count();
        let missing_left = rows
            .iter()
            .filter(|r| r.status == RowStatus::MissingLeft)
            .count();
        assert_eq!(missing_right, 1);
        assert_eq!(missing_left, 2);
    }

    #[test]
    fn test_primary_key_order_matters() {
        let row = compare_primary_key(
            &["A".to_string(), "B".to_string()],
            &["B".to_string(), "A".to_string()],
        );
        assert!(matches!(row.status, RowStatus::Mismatch(_)));

        let row = compare_primary_key(&["A".to_string()], &["A".to_string()]);
        assert_eq!(row.status, RowStatus::Ok);
    }

    #[test]
    fn test_foreign_key_set_difference() {
        // Left {(A, T1, X)}, right {}: one MissingRight row plus a count
        // mismatch row.
        let left = vec![fk("A", "T1", "X")];
        let right = vec![];

        let rows = compare_foreign_keys(&left, &right);
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0].status, RowStatus::Mismatch(_)));
        assert_eq!(rows[1].status, RowStatus::MissingRight);
        assert_eq!(rows[1].left_value.as_deref(), Some("T1.X"));
    }

    #[test]
    fn test_foreign_key_extra_in_postgres() {
        let left = vec![];
        let right = vec![fk("B", "T2", "Y")];

        let rows = compare_foreign_keys(&left, &right);
        assert_eq!(rows[1].status, RowStatus::MissingLeft);
    }

    #[test]
    fn test_report_aggregation() {
        let mut left = TableSchema::new("T");
        left.columns = col_map(vec![col("ID", "CLOB")]);
        let mut right = TableSchema::new("T");
        right.columns = col_map(vec![col("ID", "text")]);

        let report = build_report("T", &left, &right);
        assert!(!report.has_errors());

        right.columns.clear();
        let report = build_report("T", &left, &right);
        assert!(report.has_errors());
    }
}
