//! Configuration loading and validation.
//!
//! Validation only checks presence of required descriptor fields; the
//! engines themselves decide whether credentials are acceptable.

mod types;

pub use types::*;

use std::path::Path;

use crate::core::Engine;
use crate::error::{CompareError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that both sides have a usable descriptor.
    pub fn validate(&self) -> Result<()> {
        self.oracle.descriptor()?;
        self.postgres.descriptor()?;
        Ok(())
    }
}

impl OracleConfig {
    /// Build the connection descriptor, checking field presence.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        if let Some(cs) = &self.connection_string {
            return Ok(ConnectionDescriptor::new(
                Engine::Oracle,
                AuthSpec::ConnectionString(cs.clone()),
            ));
        }

        let user = require(&self.user, "oracle.user")?;
        let password = require(&self.password, "oracle.password")?;
        let dsn = require(&self.dsn, "oracle.dsn")?;

        Ok(ConnectionDescriptor::new(
            Engine::Oracle,
            AuthSpec::Fields {
                host: String::new(),
                port: 0,
                database: String::new(),
                user,
                password,
                dsn: Some(dsn),
            },
        ))
    }
}

impl PostgresConfig {
    /// Build the connection descriptor, checking field presence.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        if let Some(cs) = &self.connection_string {
            return Ok(ConnectionDescriptor::new(
                Engine::Postgres,
                AuthSpec::ConnectionString(cs.clone()),
            ));
        }

        let host = require(&self.host, "postgres.host")?;
        let database = require(&self.database, "postgres.database")?;
        let user = require(&self.user, "postgres.user")?;
        let password = require(&self.password, "postgres.password")?;

        Ok(ConnectionDescriptor::new(
            Engine::Postgres,
            AuthSpec::Fields {
                host,
                port: self.port,
                database,
                user,
                password,
                dsn: None,
            },
        ))
    }
}

fn require(field: &Option<String>, name: &str) -> Result<String> {
    match field {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(CompareError::Config(format!(
            "Missing required field: {}",
            name
        ))),
    }
}

/// Parse an Oracle-style connection string into (user, password, dsn).
///
/// Splits once on the first `/`, then once on the first `@`, so a DSN that
/// itself contains `/` or `@` parts survives intact:
/// `scott/tiger@db-host:1521/ORCLPDB1` parses to
/// (`scott`, `tiger`, `db-host:1521/ORCLPDB1`). A string without `@` yields
/// no DSN (TNS resolution is left to the driver environment).
pub fn parse_oracle_connection_string(s: &str) -> Result<(String, String, Option<String>)> {
    let (user, rest) = s.split_once('/').ok_or_else(|| {
        CompareError::Config(format!(
            "Oracle connection string must be in user/password@dsn form, got: {:?}",
            s
        ))
    })?;

    if user.is_empty() {
        return Err(CompareError::Config(
            "Oracle connection string has an empty user part".to_string(),
        ));
    }

    match rest.split_once('@') {
        Some((password, dsn)) => Ok((user.to_string(), password.to_string(), Some(dsn.to_string()))),
        None => Ok((user.to_string(), rest.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oracle_connection_string() {
        let (user, password, dsn) =
            parse_oracle_connection_string("scott/tiger@db-host:1521/ORCLPDB1").unwrap();
        assert_eq!(user, "scott");
        assert_eq!(password, "tiger");
        assert_eq!(dsn.as_deref(), Some("db-host:1521/ORCLPDB1"));
    }

    #[test]
    fn test_parse_oracle_connection_string_dsn_with_at() {
        // An '@' inside the DSN part survives: only the first one splits.
        let (_, password, dsn) = parse_oracle_connection_string("u/p@ldap@tns").unwrap();
        assert_eq!(password, "p");
        assert_eq!(dsn.as_deref(), Some("ldap@tns"));
    }

    #[test]
    fn test_parse_oracle_connection_string_without_dsn() {
        let (user, password, dsn) = parse_oracle_connection_string("scott/tiger").unwrap();
        assert_eq!(user, "scott");
        assert_eq!(password, "tiger");
        assert!(dsn.is_none());
    }

    #[test]
    fn test_parse_oracle_connection_string_rejects_malformed() {
        assert!(parse_oracle_connection_string("no-slash-here").is_err());
        assert!(parse_oracle_connection_string("/pass@dsn").is_err());
    }

    #[test]
    fn test_descriptor_requires_fields() {
        let cfg = OracleConfig {
            user: Some("scott".into()),
            ..Default::default()
        };
        let err = cfg.descriptor().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("oracle.password"));
    }

    #[test]
    fn test_descriptor_prefers_connection_string() {
        let cfg = PostgresConfig {
            connection_string: Some("postgresql://u:p@h:5432/db".into()),
            ..Default::default()
        };
        let desc = cfg.descriptor().unwrap();
        assert_eq!(desc.engine, Engine::Postgres);
        assert!(matches!(desc.auth, AuthSpec::ConnectionString(_)));
    }

    #[test]
    fn test_from_yaml_round_trip() {
        let yaml = r#"
oracle:
  user: scott
  password: tiger
  dsn: "db:1521/ORCL"
postgres:
  host: localhost
  database: bo_dev
  user: postgres
  password: secret
compare:
  tables: [TB_ORDER_HEAD, TB_ORDER_BODY]
  sample_rows: 3
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.compare.tables.len(), 2);
        assert_eq!(config.compare.sample_rows, 3);
        assert_eq!(config.compare.batch_size, 50_000);
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.ssl_mode, "require");
    }

    #[test]
    fn test_from_yaml_missing_field_fails() {
        let yaml = r#"
oracle:
  user: scott
  password: tiger
postgres:
  host: localhost
  database: bo_dev
  user: postgres
  password: secret
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}
