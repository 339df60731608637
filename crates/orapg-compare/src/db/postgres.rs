//! PostgreSQL client.
//!
//! Uses deadpool-postgres with a pool sized for the degree-2 comparison
//! shape. TLS is driven by `ssl_mode` the same way the server-side tools
//! configure it: `disable`, `require` (TLS without certificate
//! verification), `verify-ca`, `verify-full`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::StreamExt;
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio_postgres::types::Type;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};

use crate::config::{AuthSpec, ConnectionDescriptor};
use crate::core::identifier::{fold_upper, strip_index_suffix};
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use crate::core::{Engine, SqlValue};
use crate::db::{QueryStream, RowBatch, SchemaSource, CHANNEL_DEPTH, STREAM_BATCH_ROWS};
use crate::error::{CompareError, Result};

/// Two connections: one for the comparison worker, one spare for catalog
/// probes issued while a query streams.
const POOL_SIZE: usize = 2;

/// PostgreSQL client backed by a small connection pool.
pub struct PgClient {
    pool: Pool,
}

impl PgClient {
    /// Connect using the descriptor's credentials.
    ///
    /// A connection string is handed to the driver unparsed; the Fields
    /// form is assembled into a driver config directly.
    pub async fn connect(descriptor: &ConnectionDescriptor, ssl_mode: &str) -> Result<Self> {
        let pg_config = match &descriptor.auth {
            AuthSpec::ConnectionString(cs) => cs
                .parse::<PgConfig>()
                .map_err(|e| CompareError::connection(Engine::Postgres, e))?,
            AuthSpec::Fields {
                host,
                port,
                database,
                user,
                password,
                ..
            } => {
                let mut config = PgConfig::new();
                config.host(host);
                config.port(*port);
                config.dbname(database);
                config.user(user);
                config.password(password);
                config
            }
        };

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| CompareError::connection(Engine::Postgres, e))?
            }
            _ => {
                let tls_config = build_tls_config(ssl_mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| CompareError::connection(Engine::Postgres, e))?
            }
        };

        // One round-trip up front so credential failures surface here, not
        // mid-comparison.
        let client = pool
            .get()
            .await
            .map_err(|e| CompareError::connection(Engine::Postgres, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| CompareError::connection(Engine::Postgres, e))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Execute a query and stream its rows in batches.
    pub async fn run_query(&self, sql: &str) -> Result<QueryStream> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CompareError::connection(Engine::Postgres, e))?;

        let stmt = client
            .prepare(sql)
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;
        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_lowercase())
            .collect();
        let column_types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();

        let (tx, rx) = mpsc::channel::<Result<RowBatch>>(CHANNEL_DEPTH);
        tokio::spawn(async move {
            let stream = match client.query_raw(&stmt, std::iter::empty::<i32>()).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(CompareError::query(Engine::Postgres, e))).await;
                    return;
                }
            };
            futures::pin_mut!(stream);

            let mut batch: RowBatch = Vec::with_capacity(STREAM_BATCH_ROWS);
            while let Some(row) = stream.next().await {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => {
                        let _ = tx.send(Err(CompareError::query(Engine::Postgres, e))).await;
                        return;
                    }
                };
                batch.push(convert_row(&row, &column_types));
                if batch.len() >= STREAM_BATCH_ROWS
                    && tx.send(Ok(std::mem::take(&mut batch))).await.is_err()
                {
                    return;
                }
            }
            if !batch.is_empty() {
                let _ = tx.send(Ok(batch)).await;
            }
        });

        debug!(columns = columns.len(), "PostgreSQL query started");
        Ok(QueryStream::new(columns, rx))
    }

    /// Cheap liveness probe.
    pub async fn health_check(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CompareError::connection(Engine::Postgres, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;
        Ok(())
    }

    pub fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn catalog_client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| CompareError::connection(Engine::Postgres, e))
    }
}

/// Build the rustls client config for an `ssl_mode`.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth(),
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(CompareError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Convert one fetched row into engine-agnostic values.
///
/// Unconvertible values degrade to NULL rather than failing the stream;
/// column types outside the match arms are fetched as text.
fn convert_row(row: &tokio_postgres::Row, column_types: &[Type]) -> Vec<SqlValue> {
    column_types
        .iter()
        .enumerate()
        .map(|(idx, t)| convert_value(row, idx, t))
        .collect()
}

fn convert_value(row: &tokio_postgres::Row, idx: usize, col_type: &Type) -> SqlValue {
    match col_type.name() {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Int(v as i64))
            .unwrap_or(SqlValue::Null),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Int(v as i64))
            .unwrap_or(SqlValue::Null),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Null),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Float(v as f64))
            .unwrap_or(SqlValue::Null),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Float)
            .unwrap_or(SqlValue::Null),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Timestamp)
            .unwrap_or(SqlValue::Null),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::TimestampTz)
            .unwrap_or(SqlValue::Null),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Null),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Text(v.to_string()))
            .unwrap_or(SqlValue::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null),
    }
}

#[async_trait]
impl SchemaSource for PgClient {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn fetch_columns(&self, table: &str) -> Result<BTreeMap<String, ColumnInfo>> {
        let client = self.catalog_client().await?;
        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4
            FROM information_schema.columns
            WHERE table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = client
            .query(query, &[&table.to_lowercase()])
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;

        let mut columns = BTreeMap::new();
        for row in rows {
            let info = ColumnInfo {
                name: fold_upper(row.get::<_, String>(0).as_str()),
                engine_type: row.get(1),
                length: row.get(2),
                precision: row.get(3),
                scale: row.get(4),
            };
            columns.insert(info.name.clone(), info);
        }
        debug!(table = %table, count = columns.len(), "Loaded PostgreSQL columns");
        Ok(columns)
    }

    async fn fetch_indexes(&self, table: &str) -> Result<BTreeMap<String, IndexInfo>> {
        let client = self.catalog_client().await?;
        let query = r#"
            SELECT i.relname::text, a.attname::text
            FROM pg_catalog.pg_class t
            JOIN pg_catalog.pg_index ix ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_attribute a
              ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE t.relname = $1
            ORDER BY i.relname, array_position(ix.indkey, a.attnum)
        "#;

        let rows = client
            .query(query, &[&table.to_lowercase()])
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;

        let mut indexes: BTreeMap<String, IndexInfo> = BTreeMap::new();
        for row in rows {
            let name: String = row.get(0);
            let column: String = row.get(1);
            // The _IDX naming suffix is a target-side convention; the join
            // key drops it while the display name keeps the original.
            let key = strip_index_suffix(&name);
            indexes
                .entry(key)
                .or_insert_with(|| IndexInfo {
                    name: fold_upper(&name),
                    columns: Vec::new(),
                })
                .columns
                .push(fold_upper(&column));
        }
        Ok(indexes)
    }

    async fn fetch_primary_key(&self, table: &str) -> Result<Vec<String>> {
        let client = self.catalog_client().await?;
        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_index i
            JOIN pg_catalog.pg_attribute a
              ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE i.indrelid = to_regclass($1) AND i.indisprimary
            ORDER BY array_position(i.indkey, a.attnum)
        "#;

        let rows = client
            .query(query, &[&table.to_lowercase()])
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;

        Ok(rows
            .iter()
            .map(|row| fold_upper(row.get::<_, String>(0).as_str()))
            .collect())
    }

    async fn fetch_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let client = self.catalog_client().await?;
        let query = r#"
            SELECT
                att2.attname::text AS column_name,
                cl.relname::text AS referenced_table,
                att.attname::text AS referenced_column
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class tbl ON tbl.oid = con.conrelid
            CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS cols(colid, ord)
            JOIN pg_catalog.pg_attribute att2
              ON att2.attrelid = con.conrelid AND att2.attnum = cols.colid
            CROSS JOIN LATERAL unnest(con.confkey) WITH ORDINALITY AS refcols(colid, ord)
            JOIN pg_catalog.pg_attribute att
              ON att.attrelid = con.confrelid
             AND att.attnum = refcols.colid
             AND refcols.ord = cols.ord
            JOIN pg_catalog.pg_class cl ON cl.oid = con.confrelid
            WHERE con.contype = 'f'
              AND tbl.relname = $1
              AND tbl.relkind IN ('r', 'p')
              AND NOT EXISTS (SELECT 1 FROM pg_inherits WHERE inhrelid = tbl.oid)
              AND NOT EXISTS (SELECT 1 FROM pg_inherits WHERE inhrelid = cl.oid)
            ORDER BY att2.attname
        "#;

        let rows = client
            .query(query, &[&table.to_lowercase()])
            .await
            .map_err(|e| CompareError::query(Engine::Postgres, e))?;

        let mut fks: Vec<ForeignKeyInfo> = rows
            .iter()
            .map(|row| ForeignKeyInfo {
                column: fold_upper(row.get::<_, String>(0).as_str()),
                referenced_table: fold_upper(row.get::<_, String>(1).as_str()),
                referenced_column: fold_upper(row.get::<_, String>(2).as_str()),
            })
            .collect();
        fks.sort();
        Ok(fks)
    }
}

/// Certificate verifier for `ssl_mode=require`: TLS without verification,
/// matching libpq's semantics for that mode.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
