//! # orapg-compare
//!
//! Validation toolkit for Oracle to PostgreSQL data migrations.
//!
//! Two comparison pipelines share one shape: open a connection per engine,
//! fetch the same-shaped relation from both sides, normalize identifiers
//! and types across dialects, and report divergence as structured rows.
//!
//! - **Schema comparison**: per-table column, index, primary-key, and
//!   foreign-key metadata, joined across catalogs and rendered to an HTML
//!   report.
//! - **Data comparison**: equivalent queries on both engines, streamed to
//!   sentinel-encoded export files in bounded memory, compared by row
//!   fingerprints or positionally, with optional hand-off to an external
//!   diff viewer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use orapg_compare::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config);
//!     let result = orchestrator.compare_schemas().await?;
//!     println!("{} tables diverged", result.tables_with_errors());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod datadiff;
pub mod db;
pub mod difftool;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod report;
pub mod schemadiff;
pub mod typemap;

// Re-exports for convenient access
pub use config::{AuthSpec, CompareConfig, Config, ConnectionDescriptor, OracleConfig, PostgresConfig};
pub use crate::core::{ComparisonRow, Engine, RowStatus, SchemaCompareResult, Subject, TableReport};
pub use datadiff::{DataCompareOutcome, DiffMode, FileDiffReport, QuerySpec, RowSetDiff, RunPhase, Side};
pub use db::{DbClient, OracleClient, PgClient, QueryStream, SchemaSource};
pub use error::{CompareError, Result};
pub use export::{Exporter, ExportSummary};
pub use orchestrator::{HealthReport, Orchestrator, QueryDiffRequest};
