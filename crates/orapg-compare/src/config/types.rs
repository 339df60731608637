//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::core::Engine;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Oracle-side connection settings.
    pub oracle: OracleConfig,

    /// PostgreSQL-side connection settings.
    pub postgres: PostgresConfig,

    /// Comparison behavior.
    #[serde(default)]
    pub compare: CompareConfig,
}

/// Oracle connection settings. Either `connection_string` (in
/// `user/password@dsn` form) or the discrete fields must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Full connection string, e.g. `scott/tiger@db-host:1521/ORCLPDB1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// DSN or TNS entry (`host:port/service_name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
}

/// PostgreSQL connection settings. Either `connection_string` (a
/// `postgresql://` URL or key=value string, passed through to the driver
/// unparsed) or the discrete fields must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection string, passed to the driver as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Database host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

/// Comparison behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Tables to compare in a schema run.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Rows drawn by the random-sample data comparison.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Directory for exported result files.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Rows accumulated per export write.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cap on reported line-level differences in a file comparison.
    #[serde(default = "default_max_diffs")]
    pub max_reported_diffs: usize,

    /// Output path for the HTML schema comparison report.
    #[serde(default = "default_report_path")]
    pub report_path: String,

    /// Path to an external two-file diff viewer. Unset skips the launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_tool: Option<String>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            sample_rows: default_sample_rows(),
            work_dir: default_work_dir(),
            batch_size: default_batch_size(),
            max_reported_diffs: default_max_diffs(),
            report_path: default_report_path(),
            diff_tool: None,
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}

fn default_sample_rows() -> usize {
    10
}

fn default_work_dir() -> String {
    "data".to_string()
}

fn default_batch_size() -> usize {
    50_000
}

fn default_max_diffs() -> usize {
    10
}

fn default_report_path() -> String {
    "comparison_report.html".to_string()
}

/// How to authenticate against one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSpec {
    /// A single connection string. Oracle strings are parsed
    /// (`user/password@dsn`); PostgreSQL strings pass through unparsed.
    ConnectionString(String),

    /// Discrete connection fields.
    Fields {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: String,
        dsn: Option<String>,
    },
}

/// Everything needed to open one side of a comparison.
///
/// Built from caller input, consumed once by the connection provider, and
/// discarded after handle creation.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub engine: Engine,
    pub auth: AuthSpec,
}

impl ConnectionDescriptor {
    pub fn new(engine: Engine, auth: AuthSpec) -> Self {
        Self { engine, auth }
    }
}
