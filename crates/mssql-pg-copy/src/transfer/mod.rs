//! Batched, transactional table copy.
//!
//! One table is copied over a single source cursor. Rows are inserted into
//! the target inside a transaction that is committed every `batch_size`
//! rows, so a failure loses at most one batch of progress. The count
//! reported with a failure is the number of rows already committed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{MigrationConfig, RowErrorPolicy};
use crate::core::identifier::{qualify_mssql, qualify_pg, quote_mssql, quote_pg, QuoteMode};
use crate::core::schema::{Column, QualifiedName};
use crate::core::traits::{BatchWriter, InsertOutcome, RowSink, SourceStore, TargetStore};
use crate::core::value::Row;
use crate::error::{MigrateError, Result};

/// Result of copying one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyStats {
    /// Rows committed to the target.
    pub rows: u64,
    /// Number of committed transactions.
    pub commits: u64,
    /// Rows rejected by the target under the skip policy.
    pub skipped: u64,
    pub elapsed: Duration,
}

/// Copies tables from a [`SourceStore`] to a [`TargetStore`].
#[derive(Debug, Clone)]
pub struct BatchCopier {
    batch_size: usize,
    quote_mode: QuoteMode,
    on_row_error: RowErrorPolicy,
}

impl BatchCopier {
    pub fn new(batch_size: usize, quote_mode: QuoteMode, on_row_error: RowErrorPolicy) -> Self {
        Self {
            batch_size,
            quote_mode,
            on_row_error,
        }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.batch_size, config.quote_mode(), config.on_row_error)
    }

    /// Positional SELECT over `columns` on the source.
    pub fn build_select(table: &QualifiedName, columns: &[Column]) -> Result<String> {
        let cols = columns
            .iter()
            .map(|c| quote_mssql(&c.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "SELECT {} FROM {}",
            cols.join(", "),
            qualify_mssql(&table.schema, &table.name)?
        ))
    }

    /// Positional INSERT into the target, same column order as the SELECT.
    pub fn build_insert(&self, table: &QualifiedName, columns: &[Column]) -> Result<String> {
        let cols = columns
            .iter()
            .map(|c| quote_pg(&c.name, self.quote_mode))
            .collect::<Result<Vec<_>>>()?;
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualify_pg(&table.schema, &table.name, self.quote_mode)?,
            cols.join(", "),
            placeholders.join(", ")
        ))
    }

    /// Copy every row of `table`.
    ///
    /// Configuration problems (no columns, bad identifiers, zero batch size)
    /// are returned before any query is issued. Any later failure rolls back
    /// the open transaction and is returned as [`MigrateError::Copy`].
    pub async fn copy_table(
        &self,
        source: &dyn SourceStore,
        target: &dyn TargetStore,
        table: &QualifiedName,
        columns: &[Column],
    ) -> Result<CopyStats> {
        if self.batch_size == 0 {
            return Err(MigrateError::Config("batch size must be at least 1".into()));
        }
        if columns.is_empty() {
            return Err(MigrateError::Config(format!("table {} has no columns", table)));
        }
        let select_sql = Self::build_select(table, columns)?;
        let insert_sql = self.build_insert(table, columns)?;
        debug!("{}: {}", table, select_sql);
        debug!("{}: {}", table, insert_sql);

        let started = Instant::now();
        let writer = target
            .open_writer(&insert_sql)
            .await
            .map_err(|e| MigrateError::copy(table.to_string(), 0, e))?;

        let mut sink = BatchSink {
            writer,
            table,
            width: columns.len(),
            batch_size: self.batch_size,
            policy: self.on_row_error,
            in_flight: 0,
            read: 0,
            committed: 0,
            commits: 0,
            skipped: 0,
            started,
        };

        let copied = match sink.writer.begin().await {
            Ok(()) => match source.stream_rows(&select_sql, &mut sink).await {
                Ok(_) => sink.finish().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = copied {
            sink.abort().await;
            return Err(MigrateError::copy(table.to_string(), sink.committed, e));
        }

        let stats = CopyStats {
            rows: sink.committed,
            commits: sink.commits,
            skipped: sink.skipped,
            elapsed: started.elapsed(),
        };
        info!(
            "{}: copied {} rows in {:.2}s ({} commits{})",
            table,
            stats.rows,
            stats.elapsed.as_secs_f64(),
            stats.commits,
            if stats.skipped > 0 {
                format!(", {} rows skipped", stats.skipped)
            } else {
                String::new()
            }
        );
        Ok(stats)
    }
}

/// Receives streamed rows and drives the writer's transactions.
struct BatchSink<'a> {
    writer: Box<dyn BatchWriter>,
    table: &'a QualifiedName,
    width: usize,
    batch_size: usize,
    policy: RowErrorPolicy,
    /// Rows inserted in the open transaction.
    in_flight: usize,
    read: u64,
    committed: u64,
    commits: u64,
    skipped: u64,
    started: Instant,
}

impl BatchSink<'_> {
    async fn commit_batch(&mut self) -> Result<()> {
        self.writer.commit().await?;
        self.committed += self.in_flight as u64;
        self.commits += 1;
        self.in_flight = 0;

        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 {
            self.committed as f64 / secs
        } else {
            0.0
        };
        info!(
            "{}: committed batch {} ({} rows, {:.0} rows/sec)",
            self.table, self.commits, self.committed, rate
        );
        Ok(())
    }

    /// Commit the trailing partial batch, or roll back an empty one.
    async fn finish(&mut self) -> Result<()> {
        if self.in_flight > 0 {
            self.commit_batch().await
        } else {
            self.writer.rollback().await
        }
    }

    async fn abort(&mut self) {
        if let Err(e) = self.writer.rollback().await {
            warn!("{}: rollback after failure also failed: {}", self.table, e);
        }
    }
}

#[async_trait]
impl RowSink for BatchSink<'_> {
    async fn accept(&mut self, row: Row) -> Result<()> {
        self.read += 1;
        if row.len() != self.width {
            return Err(MigrateError::ColumnMismatch {
                table: self.table.to_string(),
                expected: self.width,
                actual: row.len(),
            });
        }

        match self.policy {
            RowErrorPolicy::Abort => {
                self.writer.insert(&row).await?;
                self.in_flight += 1;
            }
            RowErrorPolicy::Skip => match self.writer.insert_isolated(&row).await? {
                InsertOutcome::Inserted => self.in_flight += 1,
                InsertOutcome::Rejected(reason) => {
                    warn!("{}: skipping row {}: {}", self.table, self.read, reason);
                    self.skipped += 1;
                }
            },
        }

        if self.in_flight >= self.batch_size {
            self.commit_batch().await?;
            self.writer.begin().await?;
        }
        Ok(())
    }
}
