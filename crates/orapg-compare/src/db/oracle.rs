//! Oracle client.
//!
//! The Oracle driver is blocking, so every call runs inside
//! `spawn_blocking`; a streaming query occupies its blocking worker for the
//! full duration of the fetch, which matches the one-worker-per-side model
//! of a comparison run.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use oracle::sql_type::OracleType;
use oracle::{Connection, Row};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::{parse_oracle_connection_string, AuthSpec, ConnectionDescriptor};
use crate::core::identifier::fold_upper;
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use crate::core::{Engine, SqlValue};
use crate::db::{QueryStream, RowBatch, SchemaSource, CHANNEL_DEPTH, STREAM_BATCH_ROWS};
use crate::error::{CompareError, Result};

/// Session-level date renderings, aligned with what the Postgres side
/// produces, so exported text compares byte-for-byte.
const NLS_SESSION_FORMATS: &str = "ALTER SESSION SET \
     NLS_DATE_FORMAT = 'YYYY-MM-DD' \
     NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24.MI.SSXFF' \
     NLS_TIMESTAMP_TZ_FORMAT = 'YYYY-MM-DD HH24.MI.SSXFF TZR'";

/// Oracle client owning one exclusive connection.
pub struct OracleClient {
    conn: Arc<Connection>,
}

impl OracleClient {
    /// Connect using the descriptor's credentials.
    ///
    /// A `user/password@dsn` connection string is parsed here; the discrete
    /// Fields form requires `user`, `password`, and `dsn`.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let (user, password, dsn) = match &descriptor.auth {
            AuthSpec::ConnectionString(cs) => parse_oracle_connection_string(cs)?,
            AuthSpec::Fields {
                user,
                password,
                dsn,
                ..
            } => (user.clone(), password.clone(), dsn.clone()),
        };

        let dsn = dsn.unwrap_or_default();
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::connect(&user, &password, &dsn)?;
            conn.execute(NLS_SESSION_FORMATS, &[])?;
            Ok::<_, oracle::Error>(conn)
        })
        .await
        .map_err(|e| CompareError::Worker(e.to_string()))?
        .map_err(|e| CompareError::connection(Engine::Oracle, e))?;

        info!("Connected to Oracle");
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Run a blocking closure against the connection on a worker thread.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn))
            .await
            .map_err(|e| CompareError::Worker(e.to_string()))?
    }

    /// Execute a query and stream its rows in batches.
    ///
    /// The fetch runs on a dedicated blocking worker; backpressure comes
    /// from the bounded channel.
    pub async fn run_query(&self, sql: &str) -> Result<QueryStream> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let (meta_tx, meta_rx) = oneshot::channel::<Result<Vec<String>>>();
        let (tx, rx) = mpsc::channel::<Result<RowBatch>>(CHANNEL_DEPTH);

        tokio::task::spawn_blocking(move || {
            let rows = match conn.query(&sql, &[]) {
                Ok(rows) => rows,
                Err(e) => {
                    let _ = meta_tx.send(Err(CompareError::query(Engine::Oracle, e)));
                    return;
                }
            };

            let column_types: Vec<OracleType> = rows
                .column_info()
                .iter()
                .map(|c| c.oracle_type().clone())
                .collect();
            let columns: Vec<String> = rows
                .column_info()
                .iter()
                .map(|c| c.name().to_lowercase())
                .collect();
            if meta_tx.send(Ok(columns)).is_err() {
                return;
            }

            let mut batch: RowBatch = Vec::with_capacity(STREAM_BATCH_ROWS);
            for row in rows {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(CompareError::query(Engine::Oracle, e)));
                        return;
                    }
                };
                match convert_row(&row, &column_types) {
                    Ok(values) => batch.push(values),
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        return;
                    }
                }
                if batch.len() >= STREAM_BATCH_ROWS
                    && tx.blocking_send(Ok(std::mem::take(&mut batch))).is_err()
                {
                    // Receiver dropped; stop fetching.
                    return;
                }
            }
            if !batch.is_empty() {
                let _ = tx.blocking_send(Ok(batch));
            }
        });

        let columns = meta_rx
            .await
            .map_err(|_| CompareError::Worker("Oracle query worker died".to_string()))??;
        debug!(columns = columns.len(), "Oracle query started");
        Ok(QueryStream::new(columns, rx))
    }

    /// Run a PL/SQL block and drain its DBMS_OUTPUT lines.
    ///
    /// Procedural blocks produce no cursor; their output arrives as
    /// `column: value` lines that the exporter's accumulated mode turns
    /// into one logical row.
    pub async fn run_script_with_output(&self, sql: &str) -> Result<Vec<String>> {
        let sql = sql.to_string();
        self.with_conn(move |conn| {
            conn.execute("BEGIN dbms_output.enable(NULL); END;", &[])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;
            conn.execute(&sql, &[])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut stmt = conn
                .statement("BEGIN dbms_output.get_line(:1, :2); END;")
                .build()
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut lines = Vec::new();
            loop {
                stmt.execute(&[&OracleType::Varchar2(32_767), &OracleType::Int64])
                    .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                let status: i64 = stmt
                    .bind_value(2)
                    .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                if status != 0 {
                    break;
                }
                let line: Option<String> = stmt
                    .bind_value(1)
                    .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                if let Some(line) = line {
                    lines.push(line);
                }
            }
            debug!(lines = lines.len(), "drained DBMS_OUTPUT");
            Ok(lines)
        })
        .await
    }

    /// Cheap liveness probe.
    pub async fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row_as::<i64>("SELECT 1 FROM dual", &[])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;
            Ok(())
        })
        .await
    }

    pub fn engine(&self) -> Engine {
        Engine::Oracle
    }
}

/// Convert one fetched row into engine-agnostic values.
fn convert_row(row: &Row, column_types: &[OracleType]) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(column_types.len());
    for (idx, otype) in column_types.iter().enumerate() {
        values.push(
            convert_value(row, idx, otype).map_err(|e| CompareError::query(Engine::Oracle, e))?,
        );
    }
    Ok(values)
}

/// Convert one column value based on its declared Oracle type.
///
/// Numbers are fetched as text and re-parsed as decimals so precision
/// survives; values the decimal type cannot hold stay as text.
fn convert_value(
    row: &Row,
    idx: usize,
    otype: &OracleType,
) -> std::result::Result<SqlValue, oracle::Error> {
    let value = match otype {
        OracleType::Number(..) | OracleType::Float(_) => match row.get::<_, Option<String>>(idx)? {
            Some(s) => match Decimal::from_str(&s) {
                Ok(d) => SqlValue::Decimal(d),
                Err(_) => SqlValue::Text(s),
            },
            None => SqlValue::Null,
        },
        OracleType::Int64 => match row.get::<_, Option<i64>>(idx)? {
            Some(v) => SqlValue::Int(v),
            None => SqlValue::Null,
        },
        OracleType::BinaryFloat => match row.get::<_, Option<f32>>(idx)? {
            Some(v) => SqlValue::Float(v as f64),
            None => SqlValue::Null,
        },
        OracleType::BinaryDouble => match row.get::<_, Option<f64>>(idx)? {
            Some(v) => SqlValue::Float(v),
            None => SqlValue::Null,
        },
        OracleType::Date | OracleType::Timestamp(_) | OracleType::TimestampLTZ(_) => {
            match row.get::<_, Option<chrono::NaiveDateTime>>(idx)? {
                Some(v) => SqlValue::Timestamp(v),
                None => SqlValue::Null,
            }
        }
        OracleType::TimestampTZ(_) => {
            match row.get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)? {
                Some(v) => SqlValue::TimestampTz(v),
                None => SqlValue::Null,
            }
        }
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            match row.get::<_, Option<Vec<u8>>>(idx)? {
                Some(v) => SqlValue::Bytes(v),
                None => SqlValue::Null,
            }
        }
        OracleType::Boolean => match row.get::<_, Option<bool>>(idx)? {
            Some(v) => SqlValue::Bool(v),
            None => SqlValue::Null,
        },
        _ => match row.get::<_, Option<String>>(idx)? {
            Some(v) => SqlValue::Text(v),
            None => SqlValue::Null,
        },
    };
    Ok(value)
}

#[async_trait]
impl SchemaSource for OracleClient {
    fn engine(&self) -> Engine {
        Engine::Oracle
    }

    async fn fetch_columns(&self, table: &str) -> Result<BTreeMap<String, ColumnInfo>> {
        let table = fold_upper(table);
        self.with_conn(move |conn| {
            let sql = "SELECT column_name, data_type, data_length, data_precision, data_scale \
                 FROM user_tab_columns \
                 WHERE table_name = :1 \
                 ORDER BY column_id";
            let rows = conn
                .query(sql, &[&table])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut columns = BTreeMap::new();
            for row in rows {
                let row = row.map_err(|e| CompareError::query(Engine::Oracle, e))?;
                let info = (|| -> std::result::Result<ColumnInfo, oracle::Error> {
                    Ok(ColumnInfo {
                        name: fold_upper(&row.get::<_, String>(0)?),
                        engine_type: row.get::<_, String>(1)?,
                        length: row.get::<_, Option<i32>>(2)?,
                        precision: row.get::<_, Option<i32>>(3)?,
                        scale: row.get::<_, Option<i32>>(4)?,
                    })
                })()
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                columns.insert(info.name.clone(), info);
            }
            debug!(table = %table, count = columns.len(), "Loaded Oracle columns");
            Ok(columns)
        })
        .await
    }

    async fn fetch_indexes(&self, table: &str) -> Result<BTreeMap<String, IndexInfo>> {
        let table = fold_upper(table);
        self.with_conn(move |conn| {
            let sql = "SELECT index_name, column_name \
                 FROM user_ind_columns \
                 WHERE table_name = :1 \
                 ORDER BY index_name, column_position";
            let rows = conn
                .query(sql, &[&table])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut indexes: BTreeMap<String, IndexInfo> = BTreeMap::new();
            for row in rows {
                let row = row.map_err(|e| CompareError::query(Engine::Oracle, e))?;
                let (name, column) = (|| -> std::result::Result<_, oracle::Error> {
                    Ok((
                        fold_upper(&row.get::<_, String>(0)?),
                        fold_upper(&row.get::<_, String>(1)?),
                    ))
                })()
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                indexes
                    .entry(name.clone())
                    .or_insert_with(|| IndexInfo {
                        name,
                        columns: Vec::new(),
                    })
                    .columns
                    .push(column);
            }
            Ok(indexes)
        })
        .await
    }

    async fn fetch_primary_key(&self, table: &str) -> Result<Vec<String>> {
        let table = fold_upper(table);
        self.with_conn(move |conn| {
            let sql = "SELECT cols.column_name \
                 FROM user_constraints cons \
                 JOIN user_cons_columns cols \
                   ON cons.constraint_name = cols.constraint_name \
                 WHERE cons.constraint_type = 'P' AND cons.table_name = :1 \
                 ORDER BY cols.position";
            let rows = conn
                .query(sql, &[&table])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut pk = Vec::new();
            for row in rows {
                let row = row.map_err(|e| CompareError::query(Engine::Oracle, e))?;
                let name: String = row
                    .get(0)
                    .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                pk.push(fold_upper(&name));
            }
            Ok(pk)
        })
        .await
    }

    async fn fetch_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let table = fold_upper(table);
        self.with_conn(move |conn| {
            let sql = "SELECT a.column_name, c_pk.table_name, b.column_name \
                 FROM user_constraints c \
                 JOIN user_cons_columns a ON c.constraint_name = a.constraint_name \
                 JOIN user_constraints c_pk ON c.r_constraint_name = c_pk.constraint_name \
                 JOIN user_cons_columns b \
                   ON c_pk.constraint_name = b.constraint_name AND a.position = b.position \
                 WHERE c.constraint_type = 'R' AND c.table_name = :1 \
                 ORDER BY a.column_name";
            let rows = conn
                .query(sql, &[&table])
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;

            let mut fks = Vec::new();
            for row in rows {
                let row = row.map_err(|e| CompareError::query(Engine::Oracle, e))?;
                let fk = (|| -> std::result::Result<ForeignKeyInfo, oracle::Error> {
                    Ok(ForeignKeyInfo {
                        column: fold_upper(&row.get::<_, String>(0)?),
                        referenced_table: fold_upper(&row.get::<_, String>(1)?),
                        referenced_column: fold_upper(&row.get::<_, String>(2)?),
                    })
                })()
                .map_err(|e| CompareError::query(Engine::Oracle, e))?;
                fks.push(fk);
            }
            fks.sort();
            Ok(fks)
        })
        .await
    }
}
