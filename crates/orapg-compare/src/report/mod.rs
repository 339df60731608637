//! HTML comparison report.
//!
//! One document per schema run: for each table, a column table, an
//! index/primary-key table, and a foreign-key table, followed by a final
//! pass/fail summary across all tables. Status coloring is purely
//! presentational; the data contract lives in [`crate::core::report`].

use std::path::{Path, PathBuf};

use crate::core::report::{ComparisonRow, RowStatus, SchemaCompareResult, Subject, TableReport};
use crate::error::Result;

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2em; }\n\
table { border-collapse: collapse; margin-bottom: 1.5em; }\n\
th, td { border: 1px solid #999; padding: 4px 10px; text-align: left; }\n\
th { background: #eee; }\n\
td.ok { color: green; }\n\
td.error { color: red; font-weight: bold; }\n";

/// Render the full report document.
pub fn render_html(result: &SchemaCompareResult) -> String {
    let mut out = String::new();
    out.push_str("<html><head><meta charset='UTF-8'><title>Comparison Report</title>");
    out.push_str("<style>\n");
    out.push_str(STYLE);
    out.push_str("</style></head><body>\n");

    for table in &result.tables {
        render_table_section(&mut out, table);
    }

    render_summary(&mut out, result);
    out.push_str("</body></html>\n");
    out
}

/// Render and write the report to `path`, creating parent directories.
pub fn write_report(result: &SchemaCompareResult, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render_html(result))?;
    Ok(path.to_path_buf())
}

fn render_table_section(out: &mut String, table: &TableReport) {
    out.push_str(&format!(
        "<h2>Checking table: {}</h2>\n",
        escape_html(&table.table)
    ));

    render_rows_table(
        out,
        "Columns",
        &["Column", "Oracle", "PostgreSQL", "Status"],
        table.rows_for(Subject::Column),
    );

    let index_and_pk: Vec<&ComparisonRow> = table
        .rows_for(Subject::Index)
        .chain(table.rows_for(Subject::PrimaryKey))
        .collect();
    render_rows_table(
        out,
        "Indexes and Primary Key",
        &["Name", "Oracle", "PostgreSQL", "Status"],
        index_and_pk.into_iter(),
    );

    render_rows_table(
        out,
        "Foreign Keys",
        &["Column", "Oracle Ref", "PostgreSQL Ref", "Status"],
        table.rows_for(Subject::ForeignKey),
    );
}

fn render_rows_table<'a>(
    out: &mut String,
    title: &str,
    headers: &[&str],
    rows: impl Iterator<Item = &'a ComparisonRow>,
) {
    out.push_str(&format!("<h3>{}</h3>\n<table>\n<tr>", title));
    for h in headers {
        out.push_str(&format!("<th>{}</th>", h));
    }
    out.push_str("</tr>\n");

    for row in rows {
        let class = if row.status.is_error() { "error" } else { "ok" };
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td></tr>\n",
            escape_html(&row.name),
            escape_html(row.left_value.as_deref().unwrap_or("-")),
            escape_html(row.right_value.as_deref().unwrap_or("-")),
            class,
            escape_html(&row.status.label()),
        ));
    }
    out.push_str("</table>\n");
}

fn render_summary(out: &mut String, result: &SchemaCompareResult) {
    out.push_str("<h2>Summary of all tables</h2>\n<table>\n<tr><th>Table</th><th>Status</th></tr>\n");
    for table in &result.tables {
        let (class, label) = if table.has_errors() {
            ("error", "ERROR")
        } else {
            ("ok", "OK")
        };
        out.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td></tr>\n",
            escape_html(&table.table),
            class,
            label
        ));
    }
    out.push_str("</table>\n");
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::ComparisonRow;

    fn sample_result() -> SchemaCompareResult {
        let mut good = TableReport::new("TB_OK");
        good.rows
            .push(ComparisonRow::ok(Subject::Column, "ID", "NUMBER", "integer"));

        let mut bad = TableReport::new("TB_BAD");
        bad.rows.push(ComparisonRow {
            subject: Subject::Column,
            name: "NAME".into(),
            left_value: Some("VARCHAR2(30)".into()),
            right_value: None,
            status: RowStatus::MissingRight,
        });

        SchemaCompareResult {
            tables: vec![good, bad],
            duration_ms: 12,
        }
    }

    #[test]
    fn test_render_contains_sections_and_summary() {
        let html = render_html(&sample_result());
        assert!(html.contains("Checking table: TB_OK"));
        assert!(html.contains("Indexes and Primary Key"));
        assert!(html.contains("Foreign Keys"));
        assert!(html.contains("Summary of all tables"));
        assert!(html.contains("<td class=\"error\">ERROR</td>"));
        assert!(html.contains("<td class=\"ok\">OK</td>"));
    }

    #[test]
    fn test_html_is_escaped() {
        let mut table = TableReport::new("T<script>");
        table.rows.push(ComparisonRow::ok(
            Subject::Column,
            "A&B",
            "x<y",
            "\"quoted\"",
        ));
        let result = SchemaCompareResult {
            tables: vec![table],
            duration_ms: 0,
        };
        let html = render_html(&result);
        assert!(html.contains("T&lt;script&gt;"));
        assert!(html.contains("A&amp;B"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.html");
        let written = write_report(&sample_result(), &path).unwrap();
        assert!(written.exists());
        let content = std::fs::read_to_string(written).unwrap();
        assert!(content.starts_with("<html>"));
    }
}
