//! Core types shared by the schema and data comparators.

pub mod identifier;
pub mod report;
pub mod schema;
pub mod value;

pub use report::{ComparisonRow, RowStatus, SchemaCompareResult, Subject, TableReport};
pub use schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableSchema};
pub use value::SqlValue;

use serde::{Deserialize, Serialize};

/// A relational database engine taking part in a comparison.
///
/// Oracle catalog identifiers are upper-case canonical; PostgreSQL's are
/// lower-case canonical. All cross-engine joins fold to upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    Oracle,
    Postgres,
}

impl Engine {
    /// Short lowercase identifier used in file names and log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            Engine::Oracle => "oracle",
            Engine::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Oracle => write!(f, "Oracle"),
            Engine::Postgres => write!(f, "PostgreSQL"),
        }
    }
}
