//! Error types for comparison runs.

use thiserror::Error;

use crate::core::Engine;

/// Main error type for comparison operations.
///
/// Errors are captured per side and folded into the combined run outcome;
/// they do not propagate past the comparison boundary. The one exception is
/// [`CompareError::Worker`], which signals an unexpected failure inside a
/// concurrent worker and is re-raised to the caller after both workers have
/// finished.
#[derive(Error, Debug)]
pub enum CompareError {
    /// Configuration error (invalid YAML, missing descriptor field, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine unreachable or credentials rejected. Fatal to that side only.
    #[error("{engine} connection error: {message}")]
    Connection { engine: Engine, message: String },

    /// Query execution failure. Fatal to that side only.
    #[error("{engine} query error: {message}")]
    Query { engine: Engine, message: String },

    /// Query rejected by the modifying-statement guard.
    #[error("Not allowed to execute non-SELECT queries: {0}")]
    NotAllowed(String),

    /// I/O or formatting failure during streaming export. Fatal to that
    /// side only; partial files are left on disk.
    #[error("{engine} export error: {message}")]
    Export { engine: Engine, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A concurrent worker died (panic or runtime failure).
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl CompareError {
    /// Create a Connection error for a side.
    pub fn connection(engine: Engine, message: impl ToString) -> Self {
        CompareError::Connection {
            engine,
            message: message.to_string(),
        }
    }

    /// Create a Query error for a side.
    pub fn query(engine: Engine, message: impl ToString) -> Self {
        CompareError::Query {
            engine,
            message: message.to_string(),
        }
    }

    /// Create an Export error for a side.
    pub fn export(engine: Engine, message: impl ToString) -> Self {
        CompareError::Export {
            engine,
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Whether this error was produced before any connection attempt.
    pub fn is_config(&self) -> bool {
        matches!(self, CompareError::Config(_))
    }
}

/// Result type alias for comparison operations.
pub type Result<T> = std::result::Result<T, CompareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_error_messages_carry_engine() {
        let err = CompareError::connection(Engine::Oracle, "ORA-12541: no listener");
        assert!(err.to_string().contains("Oracle"));
        assert!(err.to_string().contains("ORA-12541"));

        let err = CompareError::query(Engine::Postgres, "relation does not exist");
        assert!(err.to_string().contains("PostgreSQL"));
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CompareError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
    }
}
