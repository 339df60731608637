//! Connection provider and engine clients.
//!
//! [`DbClient`] dispatches statically over the two engine clients. Each
//! client exposes the same narrow capability set: open a connection from a
//! [`ConnectionDescriptor`], stream a query's result set, and answer the
//! catalog questions the schema comparator asks through [`SchemaSource`].
//!
//! Connection failures are reported once, with the engine name and the
//! underlying driver message; nothing here retries.

pub mod oracle;
pub mod postgres;

pub use self::oracle::OracleClient;
pub use self::postgres::PgClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::ConnectionDescriptor;
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableSchema};
use crate::core::{Engine, SqlValue};
use crate::error::Result;

/// Rows per channel message when streaming a result set.
pub(crate) const STREAM_BATCH_ROWS: usize = 1_000;

/// In-flight batches allowed before the producer blocks (backpressure).
pub(crate) const CHANNEL_DEPTH: usize = 8;

/// A batch of rows flowing from an engine to a consumer.
pub type RowBatch = Vec<Vec<SqlValue>>;

/// A streamed result set: column names plus a bounded channel of row
/// batches. The producer side stops on the first error, which arrives as
/// the final channel message.
pub struct QueryStream {
    /// Column names, lower-cased so both engines emit the same header.
    pub columns: Vec<String>,
    rows: mpsc::Receiver<Result<RowBatch>>,
}

impl QueryStream {
    pub(crate) fn new(columns: Vec<String>, rows: mpsc::Receiver<Result<RowBatch>>) -> Self {
        Self { columns, rows }
    }

    /// Receive the next batch, or `None` when the result set is exhausted.
    pub async fn next_batch(&mut self) -> Option<Result<RowBatch>> {
        self.rows.recv().await
    }

    /// Drain the remaining batches into memory. Test and sample-flow
    /// helper; large result sets should consume batches incrementally.
    pub async fn collect_rows(mut self) -> Result<Vec<Vec<SqlValue>>> {
        let mut rows = Vec::new();
        while let Some(batch) = self.next_batch().await {
            rows.extend(batch?);
        }
        Ok(rows)
    }
}

/// Catalog access required by the schema comparator.
///
/// All names returned by implementations are folded to the upper-case
/// comparison form; the Postgres implementation additionally strips the
/// `_IDX` index-name suffix before keying.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Which engine answers these catalog questions.
    fn engine(&self) -> Engine;

    /// Column definitions keyed by upper-cased column name.
    async fn fetch_columns(&self, table: &str) -> Result<BTreeMap<String, ColumnInfo>>;

    /// Index definitions keyed by normalized index name.
    async fn fetch_indexes(&self, table: &str) -> Result<BTreeMap<String, IndexInfo>>;

    /// Primary key column names in key order.
    async fn fetch_primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Foreign key edges, sorted by local column.
    async fn fetch_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>>;

    /// Load everything the comparator needs about one table.
    async fn fetch_table_schema(&self, table: &str) -> Result<TableSchema> {
        let mut schema = TableSchema::new(table);
        schema.columns = self.fetch_columns(table).await?;
        schema.indexes = self.fetch_indexes(table).await?;
        schema.primary_key = self.fetch_primary_key(table).await?;
        schema.foreign_keys = self.fetch_foreign_keys(table).await?;
        Ok(schema)
    }
}

/// Static-dispatch wrapper over the two engine clients.
pub enum DbClient {
    Oracle(OracleClient),
    Postgres(PgClient),
}

impl DbClient {
    /// Open a connection for the descriptor's engine.
    ///
    /// PostgreSQL TLS defaults to `ssl_mode=require`; use
    /// [`DbClient::connect_with`] to override.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        Self::connect_with(descriptor, "require").await
    }

    /// Open a connection with an explicit PostgreSQL `ssl_mode`
    /// (ignored for Oracle descriptors).
    pub async fn connect_with(
        descriptor: &ConnectionDescriptor,
        pg_ssl_mode: &str,
    ) -> Result<Self> {
        match descriptor.engine {
            Engine::Oracle => Ok(Self::Oracle(OracleClient::connect(descriptor).await?)),
            Engine::Postgres => Ok(Self::Postgres(
                PgClient::connect(descriptor, pg_ssl_mode).await?,
            )),
        }
    }

    /// The engine behind this client.
    pub fn engine(&self) -> Engine {
        match self {
            Self::Oracle(c) => c.engine(),
            Self::Postgres(c) => c.engine(),
        }
    }

    /// Execute a query and stream its result set.
    pub async fn run_query(&self, sql: &str) -> Result<QueryStream> {
        match self {
            Self::Oracle(c) => c.run_query(sql).await,
            Self::Postgres(c) => c.run_query(sql).await,
        }
    }

    /// Cheap liveness probe.
    pub async fn health_check(&self) -> Result<()> {
        match self {
            Self::Oracle(c) => c.health_check().await,
            Self::Postgres(c) => c.health_check().await,
        }
    }

    /// Borrow the catalog interface.
    pub fn schema_source(&self) -> &dyn SchemaSource {
        match self {
            Self::Oracle(c) => c,
            Self::Postgres(c) => c,
        }
    }

    /// Primary key column names for a table.
    pub async fn fetch_primary_key(&self, table: &str) -> Result<Vec<String>> {
        self.schema_source().fetch_primary_key(table).await
    }
}
