//! In-memory stores for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::identifier::qualify_mssql;
use crate::core::schema::{Column, QualifiedName};
use crate::core::traits::{BatchWriter, InsertOutcome, RowSink, SourceStore, TargetStore};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Build `n` two-column rows `(id, "row-{id}")`.
pub fn numbered_rows(n: usize) -> Vec<Row> {
    (1..=n as i64)
        .map(|i| vec![SqlValue::I64(i), SqlValue::String(format!("row-{}", i))])
        .collect()
}

pub fn column(name: &str, data_type: &str, ordinal: i32) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: true,
        ordinal,
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub tables: Vec<QualifiedName>,
    pub columns: HashMap<QualifiedName, Vec<Column>>,
    pub primary_keys: HashMap<QualifiedName, Vec<String>>,
    pub rows: HashMap<QualifiedName, Vec<Row>>,
    pub sizes_mb: HashMap<QualifiedName, i64>,
    pub failing_counts: HashSet<QualifiedName>,
    pub failing_sizes: HashSet<QualifiedName>,
    /// Fail the stream when this 1-based row is reached.
    pub read_error_at: Option<usize>,
    pub fail_catalog: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_table(mut self, table: QualifiedName, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        self.tables.push(table.clone());
        self.columns.insert(table.clone(), columns);
        self.rows.insert(table, rows);
        self
    }

    fn record(&self, query: String) {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query);
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn table_for_sql(&self, sql: &str) -> Option<&QualifiedName> {
        self.tables.iter().find(|t| {
            qualify_mssql(&t.schema, &t.name)
                .map(|q| sql.contains(&q))
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl SourceStore for FakeSource {
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<QualifiedName>> {
        if self.fail_catalog {
            return Err(MigrateError::metadata("list tables", "catalog unavailable"));
        }
        let mut tables: Vec<QualifiedName> = self
            .tables
            .iter()
            .filter(|t| schemas.iter().any(|s| s.eq_ignore_ascii_case(&t.schema)))
            .cloned()
            .collect();
        tables.sort();
        Ok(tables)
    }

    async fn load_columns(&self, table: &QualifiedName) -> Result<Vec<Column>> {
        self.record(format!("columns {}", table));
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn load_primary_key(&self, table: &QualifiedName) -> Result<Vec<String>> {
        Ok(self.primary_keys.get(table).cloned().unwrap_or_default())
    }

    async fn row_count(&self, table: &QualifiedName) -> Result<i64> {
        self.record(format!("count {}", table));
        if self.failing_counts.contains(table) {
            return Err(MigrateError::metadata(table.to_string(), "count failed"));
        }
        Ok(self.rows.get(table).map(|r| r.len() as i64).unwrap_or(0))
    }

    async fn size_mb(&self, table: &QualifiedName) -> Result<i64> {
        self.record(format!("size {}", table));
        if self.failing_sizes.contains(table) {
            return Err(MigrateError::metadata(table.to_string(), "size failed"));
        }
        Ok(self.sizes_mb.get(table).copied().unwrap_or(0))
    }

    async fn stream_rows(&self, select_sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        self.record(format!("select {}", select_sql));
        let rows = self
            .table_for_sql(select_sql)
            .and_then(|t| self.rows.get(t))
            .cloned()
            .unwrap_or_default();

        let mut read = 0u64;
        for (i, row) in rows.into_iter().enumerate() {
            if self.read_error_at == Some(i + 1) {
                return Err(MigrateError::Connection("source stream dropped".into()));
            }
            sink.accept(row).await?;
            read += 1;
        }
        Ok(read)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriterEvent {
    Begin,
    Insert(Row),
    Rejected(u64),
    Commit { rows: usize },
    Rollback { rows: usize },
}

#[derive(Default)]
pub struct FakeTarget {
    pub events: Arc<Mutex<Vec<WriterEvent>>>,
    pub insert_sql: Mutex<Vec<String>>,
    /// Fail the plain insert of this 1-based row.
    pub fail_insert_at: Option<u64>,
    /// Rows (1-based) the target rejects under savepoint isolation.
    pub rejected_rows: HashSet<u64>,
    pub populated: HashSet<String>,
    pub missing: HashSet<String>,
    pub fail_truncate: bool,
    pub truncated: Mutex<Vec<String>>,
}

impl FakeTarget {
    pub fn events(&self) -> Vec<WriterEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn commits(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WriterEvent::Commit { rows } => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn rollbacks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, WriterEvent::Rollback { .. }))
            .count()
    }
}

#[async_trait]
impl TargetStore for FakeTarget {
    async fn open_writer(&self, insert_sql: &str) -> Result<Box<dyn BatchWriter>> {
        if let Ok(mut sql) = self.insert_sql.lock() {
            sql.push(insert_sql.to_string());
        }
        Ok(Box::new(FakeWriter {
            events: Arc::clone(&self.events),
            fail_insert_at: self.fail_insert_at,
            rejected_rows: self.rejected_rows.clone(),
            attempts: 0,
            pending: 0,
        }))
    }

    async fn has_rows(&self, qualified_table: &str) -> Result<bool> {
        if self.missing.contains(qualified_table) {
            return Err(MigrateError::Connection(format!(
                "relation \"{}\" does not exist",
                qualified_table
            )));
        }
        Ok(self.populated.contains(qualified_table))
    }

    async fn truncate(&self, qualified_table: &str) -> Result<()> {
        if self.fail_truncate {
            return Err(MigrateError::Connection("truncate denied".into()));
        }
        if let Ok(mut truncated) = self.truncated.lock() {
            truncated.push(qualified_table.to_string());
        }
        Ok(())
    }
}

pub struct FakeWriter {
    events: Arc<Mutex<Vec<WriterEvent>>>,
    fail_insert_at: Option<u64>,
    rejected_rows: HashSet<u64>,
    attempts: u64,
    pending: usize,
}

impl FakeWriter {
    fn push(&self, event: WriterEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl BatchWriter for FakeWriter {
    async fn begin(&mut self) -> Result<()> {
        self.pending = 0;
        self.push(WriterEvent::Begin);
        Ok(())
    }

    async fn insert(&mut self, row: &Row) -> Result<()> {
        self.attempts += 1;
        if self.fail_insert_at == Some(self.attempts) {
            return Err(MigrateError::Connection(format!(
                "insert of row {} rejected",
                self.attempts
            )));
        }
        self.pending += 1;
        self.push(WriterEvent::Insert(row.clone()));
        Ok(())
    }

    async fn insert_isolated(&mut self, row: &Row) -> Result<InsertOutcome> {
        self.attempts += 1;
        if self.rejected_rows.contains(&self.attempts) {
            self.push(WriterEvent::Rejected(self.attempts));
            return Ok(InsertOutcome::Rejected("duplicate key value".into()));
        }
        self.pending += 1;
        self.push(WriterEvent::Insert(row.clone()));
        Ok(InsertOutcome::Inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        let rows = std::mem::take(&mut self.pending);
        self.push(WriterEvent::Commit { rows });
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let rows = std::mem::take(&mut self.pending);
        self.push(WriterEvent::Rollback { rows });
        Ok(())
    }
}
