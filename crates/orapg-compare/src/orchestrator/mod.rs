//! Top-level comparison runs.
//!
//! Ties the pieces together: resolves connection descriptors from
//! configuration, drives the schema and data comparators, writes the HTML
//! report, and hands export files to the external diff viewer.

pub mod join;

use std::time::Instant;

use tracing::{info, warn};

use crate::config::{Config, ConnectionDescriptor};
use crate::core::report::SchemaCompareResult;
use crate::core::{Engine, SqlValue};
use crate::datadiff::{
    self, compare_files_by_fingerprint, compare_files_positional, predicate, DataCompareOutcome,
    DiffMode, QuerySpec, RunPhase, Side, SideOutcome,
};
use crate::db::DbClient;
use crate::difftool;
use crate::error::{CompareError, Result};
use crate::export::Exporter;
use crate::report;
use crate::schemadiff;

/// One ad-hoc two-sided query comparison.
#[derive(Debug, Clone)]
pub struct QueryDiffRequest {
    pub left_engine: Engine,
    pub left_query: String,
    pub right_engine: Engine,
    pub right_query: String,
    pub mode: DiffMode,
}

/// Connection probe outcome per engine; `None` means healthy.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub oracle: Option<String>,
    pub postgres: Option<String>,
}

impl HealthReport {
    pub fn all_ok(&self) -> bool {
        self.oracle.is_none() && self.postgres.is_none()
    }
}

/// Comparison run driver.
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn exporter(&self) -> Exporter {
        Exporter::new(&self.config.compare.work_dir, self.config.compare.batch_size)
    }

    fn descriptor_for(&self, engine: Engine) -> Result<ConnectionDescriptor> {
        match engine {
            Engine::Oracle => self.config.oracle.descriptor(),
            Engine::Postgres => self.config.postgres.descriptor(),
        }
    }

    fn spec_for(&self, engine: Engine, query: String) -> Result<QuerySpec> {
        let mut spec = QuerySpec::new(self.descriptor_for(engine)?, query);
        spec.pg_ssl_mode = self.config.postgres.ssl_mode.clone();
        Ok(spec)
    }

    /// Compare schema metadata for every configured table and write the
    /// HTML report.
    pub async fn compare_schemas(&self) -> Result<SchemaCompareResult> {
        let start = Instant::now();
        let tables = &self.config.compare.tables;
        if tables.is_empty() {
            return Err(CompareError::Config(
                "no tables configured for schema comparison (compare.tables)".to_string(),
            ));
        }

        let oracle = DbClient::connect(&self.config.oracle.descriptor()?).await?;
        let postgres = DbClient::connect_with(
            &self.config.postgres.descriptor()?,
            &self.config.postgres.ssl_mode,
        )
        .await?;

        let mut result = SchemaCompareResult::default();
        for table in tables {
            let report =
                schemadiff::compare_table(oracle.schema_source(), postgres.schema_source(), table)
                    .await?;
            if report.has_errors() {
                warn!(table = %table, "schema divergence found");
            }
            result.tables.push(report);
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        let report_path = std::path::Path::new(&self.config.compare.report_path);
        report::write_report(&result, report_path)?;
        info!(
            tables = result.tables.len(),
            errors = result.tables_with_errors(),
            report = %report_path.display(),
            "schema comparison complete"
        );

        Ok(result)
    }

    /// Run one query per side, export both result sets, compare the
    /// files, and optionally launch the diff viewer.
    pub async fn query_diff(&self, request: QueryDiffRequest) -> Result<DataCompareOutcome> {
        let left = self.spec_for(request.left_engine, request.left_query)?;
        let right = self.spec_for(request.right_engine, request.right_query)?;

        let outcome = datadiff::run_pair(
            left,
            right,
            &self.exporter(),
            request.mode,
            self.config.compare.max_reported_diffs,
        )
        .await?;

        if let Some((left_path, right_path)) = outcome.export_paths() {
            difftool::launch_diff_viewer(
                self.config.compare.diff_tool.as_deref(),
                left_path,
                right_path,
            )?;
        }

        Ok(outcome)
    }

    /// Random-sample comparison of one table.
    ///
    /// Draws N random rows on the Postgres side, derives an OR-of-AND
    /// equality predicate over the primary key from the sampled keys, and
    /// issues that predicate against Oracle, so both sides export exactly
    /// the same key set sorted by the primary key. The steps are
    /// dependent, so this flow runs sequentially and any failure aborts
    /// the run.
    pub async fn sample_compare(
        &self,
        table: &str,
        rows_override: Option<usize>,
    ) -> Result<DataCompareOutcome> {
        let start = Instant::now();
        let sample_rows = rows_override.unwrap_or(self.config.compare.sample_rows);
        let exporter = self.exporter();

        let postgres = DbClient::connect_with(
            &self.config.postgres.descriptor()?,
            &self.config.postgres.ssl_mode,
        )
        .await?;

        let pk = postgres.fetch_primary_key(table).await?;
        if pk.is_empty() {
            return Err(CompareError::Config(format!(
                "table {} has no primary key; the sample flow needs one",
                table
            )));
        }
        info!(table = %table, pk = ?pk, "sampling by primary key");

        // Postgres side: draw the sample and keep it in memory (it is at
        // most sample_rows rows).
        let pg_start = Instant::now();
        let sample_sql = predicate::sample_query(Engine::Postgres, table, &pk, sample_rows)?;
        let stream = postgres.run_query(&sample_sql).await?;
        let columns = stream.columns.clone();
        let rows = stream.collect_rows().await?;
        if rows.is_empty() {
            return Err(CompareError::query(
                Engine::Postgres,
                format!("sample query returned no rows for table {}", table),
            ));
        }

        let key_indexes: Vec<usize> = pk
            .iter()
            .map(|key| {
                columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(key))
                    .ok_or_else(|| {
                        CompareError::query(
                            Engine::Postgres,
                            format!("primary key column {} missing from sample result", key),
                        )
                    })
            })
            .collect::<Result<_>>()?;
        let keys: Vec<Vec<SqlValue>> = rows
            .iter()
            .map(|row| key_indexes.iter().map(|&i| row[i].clone()).collect())
            .collect();

        let pg_path = exporter.target_path(Side::Right.tag());
        let pg_export = exporter.export_rows(&columns, &rows, Engine::Postgres, &pg_path)?;
        let right = SideOutcome {
            side: Side::Right,
            engine: Engine::Postgres,
            phase: RunPhase::Completed,
            export: Some(pg_export),
            error: None,
            duration_ms: pg_start.elapsed().as_millis() as u64,
        };

        // Oracle side: exactly the sampled key set, same sort order.
        let ora_start = Instant::now();
        let where_clause = predicate::sampled_key_predicate(Engine::Oracle, &pk, &keys)?;
        info!(predicate = %where_clause, "derived Oracle predicate");

        let oracle = DbClient::connect(&self.config.oracle.descriptor()?).await?;
        let keyed_sql = predicate::keyed_query(Engine::Oracle, table, &pk, &where_clause)?;
        let ora_stream = oracle.run_query(&keyed_sql).await?;
        let ora_path = exporter.target_path(Side::Left.tag());
        let ora_export = exporter
            .export_stream(ora_stream, Engine::Oracle, &ora_path)
            .await?;
        let left = SideOutcome {
            side: Side::Left,
            engine: Engine::Oracle,
            phase: RunPhase::Completed,
            export: Some(ora_export),
            error: None,
            duration_ms: ora_start.elapsed().as_millis() as u64,
        };

        let max_reported = self.config.compare.max_reported_diffs;
        let positional = compare_files_positional(&ora_path, &pg_path, max_reported)?;
        let fingerprints = compare_files_by_fingerprint(&ora_path, &pg_path, max_reported)?;

        difftool::launch_diff_viewer(
            self.config.compare.diff_tool.as_deref(),
            &ora_path,
            &pg_path,
        )?;

        Ok(DataCompareOutcome {
            left,
            right,
            positional: Some(positional),
            fingerprints: Some(fingerprints),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Probe both engines; failures are reported per side, never raised.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let oracle_desc = self.config.oracle.descriptor()?;
        let postgres_desc = self.config.postgres.descriptor()?;
        let ssl_mode = self.config.postgres.ssl_mode.clone();

        let (oracle, postgres) = tokio::join!(
            async {
                match DbClient::connect(&oracle_desc).await {
                    Ok(client) => client.health_check().await.err().map(|e| e.to_string()),
                    Err(e) => Some(e.to_string()),
                }
            },
            async {
                match DbClient::connect_with(&postgres_desc, &ssl_mode).await {
                    Ok(client) => client.health_check().await.err().map(|e| e.to_string()),
                    Err(e) => Some(e.to_string()),
                }
            }
        );

        Ok(HealthReport { oracle, postgres })
    }
}
