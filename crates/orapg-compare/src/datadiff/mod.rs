//! Data comparator.
//!
//! Runs one query per side, streams both result sets to sentinel-encoded
//! export files, and compares the files either as fingerprint multisets
//! (order-insensitive) or positionally (lock-step under a shared sort
//! key). Each side's path is connect → execute → export on its own worker;
//! a failure on one side never cancels the other, and the combined outcome
//! reports both sides.

pub mod fingerprint;
pub mod guard;
pub mod lockstep;
pub mod predicate;

pub use fingerprint::{compare_files_by_fingerprint, RowSetDiff};
pub use lockstep::{compare_files_positional, FileDiffReport, LineDiff};

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConnectionDescriptor;
use crate::core::Engine;
use crate::db::DbClient;
use crate::error::{CompareError, Result};
use crate::export::{Exporter, ExportSummary};
use crate::orchestrator::join;

/// Which side of the comparison a worker drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn tag(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Progression of one side's run. `Failed` is terminal and carries the
/// first error encountered; `Completed` implies an export path exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    Connecting,
    Executing,
    Exporting,
    Completed,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Connecting => "connecting",
            RunPhase::Executing => "executing",
            RunPhase::Exporting => "exporting",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// How the two exported files are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Multiset of row fingerprints; order-insensitive, holds one side's
    /// digest index in memory.
    #[default]
    Fingerprint,

    /// Lock-step positional diff; requires both sides sorted by the same
    /// key, touches no per-row index.
    Positional,
}

/// One side's work order.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub descriptor: ConnectionDescriptor,
    pub query: String,

    /// PostgreSQL `ssl_mode` (ignored by Oracle descriptors).
    pub pg_ssl_mode: String,
}

impl QuerySpec {
    pub fn new(descriptor: ConnectionDescriptor, query: impl Into<String>) -> Self {
        Self {
            descriptor,
            query: query.into(),
            pg_ssl_mode: "require".to_string(),
        }
    }
}

/// Terminal state of one side.
#[derive(Debug)]
pub struct SideOutcome {
    pub side: Side,
    pub engine: Engine,
    pub phase: RunPhase,
    pub export: Option<ExportSummary>,
    pub error: Option<CompareError>,
    pub duration_ms: u64,
}

impl SideOutcome {
    pub fn succeeded(&self) -> bool {
        self.phase == RunPhase::Completed
    }
}

/// Combined result of one data comparison run.
#[derive(Debug)]
pub struct DataCompareOutcome {
    pub left: SideOutcome,
    pub right: SideOutcome,
    pub positional: Option<FileDiffReport>,
    pub fingerprints: Option<RowSetDiff>,
    pub duration_ms: u64,
}

impl DataCompareOutcome {
    pub fn both_succeeded(&self) -> bool {
        self.left.succeeded() && self.right.succeeded()
    }

    /// Export paths once both sides completed.
    pub fn export_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.left.export, &self.right.export) {
            (Some(l), Some(r)) => Some((l.path.as_path(), r.path.as_path())),
            _ => None,
        }
    }

    /// Per-side error lines in the original `engine: message` form.
    pub fn error_summary(&self) -> Option<String> {
        let mut lines = Vec::new();
        for outcome in [&self.left, &self.right] {
            if let Some(err) = &outcome.error {
                lines.push(format!("{}: {}", outcome.engine, err));
            }
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Run both sides concurrently and compare the exports.
///
/// The two workers are joined with a barrier: the outcome exists only
/// after both have terminated, success or failure. File comparison runs
/// only when both sides completed.
pub async fn run_pair(
    left: QuerySpec,
    right: QuerySpec,
    exporter: &Exporter,
    mode: DiffMode,
    max_reported: usize,
) -> Result<DataCompareOutcome> {
    let start = Instant::now();

    let mut outcomes = join::fan_out(vec![
        join::boxed(run_side(Side::Left, left, exporter.clone())),
        join::boxed(run_side(Side::Right, right, exporter.clone())),
    ])
    .await?;
    let right_outcome = outcomes.pop().expect("two workers joined");
    let left_outcome = outcomes.pop().expect("two workers joined");

    let mut outcome = DataCompareOutcome {
        left: left_outcome,
        right: right_outcome,
        positional: None,
        fingerprints: None,
        duration_ms: 0,
    };

    let paths = outcome
        .export_paths()
        .map(|(l, r)| (l.to_path_buf(), r.to_path_buf()));
    match paths {
        Some((left_path, right_path)) => match mode {
            DiffMode::Positional => {
                outcome.positional =
                    Some(compare_files_positional(&left_path, &right_path, max_reported)?);
            }
            DiffMode::Fingerprint => {
                outcome.fingerprints = Some(compare_files_by_fingerprint(
                    &left_path,
                    &right_path,
                    max_reported,
                )?);
            }
        },
        None => {
            if let Some(summary) = outcome.error_summary() {
                warn!("data comparison completed with per-side errors:\n{}", summary);
            }
        }
    }

    outcome.duration_ms = start.elapsed().as_millis() as u64;
    Ok(outcome)
}

/// Drive one side through its full phase sequence.
pub async fn run_side(side: Side, spec: QuerySpec, exporter: Exporter) -> SideOutcome {
    let start = Instant::now();
    let engine = spec.descriptor.engine;
    let mut phase = RunPhase::Idle;

    let result = run_side_inner(side, &spec, &exporter, &mut phase).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(export) => {
            info!(
                side = side.tag(),
                engine = engine.tag(),
                rows = export.rows,
                duration_ms,
                "side completed"
            );
            SideOutcome {
                side,
                engine,
                phase: RunPhase::Completed,
                export: Some(export),
                error: None,
                duration_ms,
            }
        }
        Err(error) => {
            warn!(
                side = side.tag(),
                engine = engine.tag(),
                phase = %phase,
                %error,
                "side failed"
            );
            SideOutcome {
                side,
                engine,
                phase: RunPhase::Failed,
                export: None,
                error: Some(error),
                duration_ms,
            }
        }
    }
}

async fn run_side_inner(
    side: Side,
    spec: &QuerySpec,
    exporter: &Exporter,
    phase: &mut RunPhase,
) -> Result<ExportSummary> {
    let engine = spec.descriptor.engine;

    if spec.query.trim().is_empty() {
        return Err(CompareError::query(engine, "query is empty"));
    }
    guard::ensure_read_only(&spec.query)?;

    *phase = RunPhase::Connecting;
    let client = DbClient::connect_with(&spec.descriptor, &spec.pg_ssl_mode).await?;

    *phase = RunPhase::Executing;
    let path = exporter.target_path(side.tag());

    // Procedural Oracle blocks produce no result set; their DBMS_OUTPUT
    // lines export in single accumulated-row mode instead.
    if let DbClient::Oracle(oracle) = &client {
        if is_procedural(&spec.query) {
            let lines = oracle.run_script_with_output(&spec.query).await?;
            *phase = RunPhase::Exporting;
            return exporter.export_accumulated(&lines, engine, &path);
        }
    }

    let exec_start = Instant::now();
    let stream = client.run_query(&spec.query).await?;
    info!(
        side = side.tag(),
        engine = engine.tag(),
        elapsed_ms = exec_start.elapsed().as_millis() as u64,
        "query started"
    );

    *phase = RunPhase::Exporting;
    exporter.export_stream(stream, engine, &path).await
}

/// A block that runs under the procedural engine rather than as a cursor
/// query.
fn is_procedural(query: &str) -> bool {
    let q = query.trim_start().to_uppercase();
    q.starts_with("BEGIN") || q.starts_with("DECLARE")
}
