//! orapg-compare CLI - Oracle to PostgreSQL migration validation.

use clap::{Parser, Subcommand, ValueEnum};
use orapg_compare::{
    CompareError, Config, DiffMode, Engine, Orchestrator, QueryDiffRequest,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "orapg-compare")]
#[command(about = "Validate Oracle to PostgreSQL migrations: schema and data comparison")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Oracle,
    Postgres,
}

impl From<EngineArg> for Engine {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Oracle => Engine::Oracle,
            EngineArg::Postgres => Engine::Postgres,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Order-insensitive row fingerprint comparison
    Fingerprint,
    /// Lock-step positional comparison (requires a shared sort key)
    Positional,
}

impl From<ModeArg> for DiffMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Fingerprint => DiffMode::Fingerprint,
            ModeArg::Positional => DiffMode::Positional,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare schema metadata for the configured tables
    Schemas,

    /// Run one query per side, export both result sets, and compare them
    QueryDiff {
        /// Engine the left query runs against
        #[arg(long, value_enum, default_value = "oracle")]
        left_engine: EngineArg,

        /// Left-side SQL query
        #[arg(long)]
        left_query: String,

        /// Engine the right query runs against
        #[arg(long, value_enum, default_value = "postgres")]
        right_engine: EngineArg,

        /// Right-side SQL query
        #[arg(long)]
        right_query: String,

        /// File comparison mode
        #[arg(long, value_enum, default_value = "fingerprint")]
        mode: ModeArg,
    },

    /// Random-sample comparison of one table keyed by its primary key
    Sample {
        /// Table to sample
        table: String,

        /// Override the configured sample row count
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Test both database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run() -> Result<(), CompareError> {
    let cli = Cli::parse();
    init_tracing(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    let orchestrator = Orchestrator::new(config);

    match cli.command {
        Commands::Schemas => {
            let result = orchestrator.compare_schemas().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for table in &result.tables {
                    let status = if table.has_errors() { "ERROR" } else { "OK" };
                    println!("{:40} {}", table.table, status);
                }
                println!(
                    "\n{} tables compared, {} with divergence ({} ms)",
                    result.tables.len(),
                    result.tables_with_errors(),
                    result.duration_ms
                );
            }
            if !result.all_ok() {
                return Err(CompareError::Config(
                    "schema comparison found divergence".to_string(),
                ));
            }
        }

        Commands::QueryDiff {
            left_engine,
            left_query,
            right_engine,
            right_query,
            mode,
        } => {
            let outcome = orchestrator
                .query_diff(QueryDiffRequest {
                    left_engine: left_engine.into(),
                    left_query,
                    right_engine: right_engine.into(),
                    right_query,
                    mode: mode.into(),
                })
                .await?;
            print_outcome(&outcome, cli.output_json)?;
            if !outcome.both_succeeded() {
                return Err(CompareError::Worker(
                    outcome
                        .error_summary()
                        .unwrap_or_else(|| "one side failed".to_string()),
                ));
            }
        }

        Commands::Sample { table, rows } => {
            let outcome = orchestrator.sample_compare(&table, rows).await?;
            print_outcome(&outcome, cli.output_json)?;
        }

        Commands::HealthCheck => {
            let report = orchestrator.health_check().await?;
            match &report.oracle {
                None => println!("Oracle:     OK"),
                Some(e) => println!("Oracle:     FAILED ({})", e),
            }
            match &report.postgres {
                None => println!("PostgreSQL: OK"),
                Some(e) => println!("PostgreSQL: FAILED ({})", e),
            }
            if !report.all_ok() {
                return Err(CompareError::Config(
                    "one or both connections failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn print_outcome(
    outcome: &orapg_compare::DataCompareOutcome,
    as_json: bool,
) -> Result<(), CompareError> {
    if as_json {
        let value = json!({
            "left": side_json(&outcome.left),
            "right": side_json(&outcome.right),
            "positional": outcome.positional.as_ref().map(|p| json!({
                "match": p.is_match(),
                "summary": p.summary(),
                "differences": p.differences.iter().map(|d| json!({
                    "line": d.line_number,
                    "left": d.left,
                    "right": d.right,
                })).collect::<Vec<_>>(),
            })),
            "fingerprints": outcome.fingerprints.as_ref().map(|f| json!({
                "match": f.is_match(),
                "only_left": f.only_left_total,
                "only_right": f.only_right_total,
            })),
            "duration_ms": outcome.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for side in [&outcome.left, &outcome.right] {
        match (&side.export, &side.error) {
            (Some(export), _) => println!(
                "{:?} ({}): {} rows -> {}",
                side.side,
                side.engine,
                export.rows,
                export.path.display()
            ),
            (None, Some(error)) => println!("{:?} ({}): {}", side.side, side.engine, error),
            (None, None) => {}
        }
    }

    if let Some(p) = &outcome.positional {
        println!("{}", p.summary());
        for diff in &p.differences {
            println!(
                "Line {}: \"{}\" vs \"{}\"",
                diff.line_number, diff.left, diff.right
            );
        }
    }
    if let Some(f) = &outcome.fingerprints {
        if f.is_match() {
            println!(
                "Row sets match ({} vs {} rows)",
                f.left_rows, f.right_rows
            );
        } else {
            println!(
                "Row sets differ: {} only in left, {} only in right",
                f.only_left_total, f.only_right_total
            );
            for line in &f.only_left {
                println!("only-left:  {}", line);
            }
            for line in &f.only_right {
                println!("only-right: {}", line);
            }
        }
    }
    info!(duration_ms = outcome.duration_ms, "comparison finished");
    Ok(())
}

fn side_json(side: &orapg_compare::datadiff::SideOutcome) -> serde_json::Value {
    json!({
        "engine": side.engine.tag(),
        "phase": side.phase.to_string(),
        "rows": side.export.as_ref().map(|e| e.rows),
        "path": side.export.as_ref().map(|e| e.path.display().to_string()),
        "error": side.error.as_ref().map(|e| e.to_string()),
        "duration_ms": side.duration_ms,
    })
}

fn init_tracing(verbosity: &str, log_format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log_format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_code(error: &CompareError) -> u8 {
    match error {
        CompareError::Config(_) => 2,
        CompareError::Connection { .. } => 3,
        CompareError::Query { .. } | CompareError::NotAllowed(_) => 4,
        CompareError::Export { .. } => 5,
        _ => 1,
    }
}
