//! Catalog metadata types for tables, columns, indexes, and constraints.
//!
//! These types are an engine-agnostic view of what each catalog reports.
//! Names are stored as returned by the engine; comparison joins fold them
//! to upper case via [`crate::core::identifier::fold_upper`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column metadata as reported by an engine's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Engine-native type name (e.g., "VARCHAR2", "character varying").
    pub engine_type: String,

    /// Declared length for character types.
    pub length: Option<i32>,

    /// Numeric precision.
    pub precision: Option<i32>,

    /// Numeric scale.
    pub scale: Option<i32>,
}

/// Index metadata: a name and its ordered column list.
///
/// Names are normalized to upper case when loaded. The Postgres-side name
/// may carry an `_IDX` suffix that is stripped before the cross-engine join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name, upper-cased.
    pub name: String,

    /// Indexed column names in index order, upper-cased.
    pub columns: Vec<String>,
}

/// A foreign key edge. Equality is structural: two edges are the same
/// constraint iff all three parts match after upper-casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Local column name, upper-cased.
    pub column: String,

    /// Referenced table name, upper-cased.
    pub referenced_table: String,

    /// Referenced column name, upper-cased.
    pub referenced_column: String,
}

impl ForeignKeyInfo {
    /// Render the referenced side as `TABLE.COLUMN` for reporting.
    pub fn referenced(&self) -> String {
        format!("{}.{}", self.referenced_table, self.referenced_column)
    }
}

/// Everything the schema comparator needs about one table on one engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name as supplied by the caller.
    pub table: String,

    /// Columns keyed by upper-cased name. Unique within a table.
    pub columns: BTreeMap<String, ColumnInfo>,

    /// Indexes keyed by normalized (upper-cased, suffix-stripped) name.
    pub indexes: BTreeMap<String, IndexInfo>,

    /// Primary key column names in key order, upper-cased.
    pub primary_key: Vec<String>,

    /// Foreign key edges, sorted by local column.
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableSchema {
    /// Create an empty schema for a table name.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_structural_equality() {
        let a = ForeignKeyInfo {
            column: "A".into(),
            referenced_table: "T1".into(),
            referenced_column: "X".into(),
        };
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.referenced(), "T1.X");
    }
}
