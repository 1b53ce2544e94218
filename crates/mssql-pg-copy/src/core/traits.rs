//! Store seams used by the copy engine.
//!
//! - [`SourceStore`]: catalog queries and row streaming on SQL Server
//! - [`TargetStore`]: PostgreSQL table probes and writer handles
//! - [`BatchWriter`]: one connection's transaction lifecycle for inserts
//! - [`RowSink`]: receives decoded rows from a source stream

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{Column, QualifiedName};
use super::value::Row;

/// Receives source rows one at a time, in stream order.
#[async_trait]
pub trait RowSink: Send {
    async fn accept(&mut self, row: Row) -> Result<()>;
}

/// Read-only access to the source store.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Base tables (no views) whose schema is in `schemas`, ordered by
    /// schema then name.
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<QualifiedName>>;

    /// Columns of `table` in ordinal order.
    async fn load_columns(&self, table: &QualifiedName) -> Result<Vec<Column>>;

    /// Primary key column names in key order; empty if none.
    async fn load_primary_key(&self, table: &QualifiedName) -> Result<Vec<String>>;

    /// Live row count.
    async fn row_count(&self, table: &QualifiedName) -> Result<i64>;

    /// Estimated on-disk size in MB.
    async fn size_mb(&self, table: &QualifiedName) -> Result<i64>;

    /// Run `select_sql` on a single cursor and push every row into `sink`.
    ///
    /// Returns the number of rows read. The first error from the driver or
    /// from the sink stops the stream and is returned.
    async fn stream_rows(&self, select_sql: &str, sink: &mut dyn RowSink) -> Result<u64>;
}

/// Access to the target store.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Check out a dedicated connection that will execute `insert_sql`.
    async fn open_writer(&self, insert_sql: &str) -> Result<Box<dyn BatchWriter>>;

    /// Whether the (already quoted) table holds at least one row.
    async fn has_rows(&self, qualified_table: &str) -> Result<bool>;

    /// Remove every row from the (already quoted) table.
    async fn truncate(&self, qualified_table: &str) -> Result<()>;
}

/// Result of an isolated insert under the skip policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The target rejected the row; carries the server's message.
    Rejected(String),
}

/// Transaction lifecycle on one target connection.
///
/// `begin` opens a transaction and prepares the insert statement; `commit`
/// and `rollback` end it and discard the prepared statement.
#[async_trait]
pub trait BatchWriter: Send {
    async fn begin(&mut self) -> Result<()>;

    /// Execute the prepared insert with positional parameters.
    async fn insert(&mut self, row: &Row) -> Result<()>;

    /// Execute the insert inside a savepoint so a rejected row does not
    /// poison the open transaction.
    async fn insert_isolated(&mut self, row: &Row) -> Result<InsertOutcome>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
