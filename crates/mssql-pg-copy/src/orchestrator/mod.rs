//! Migration orchestrator - main workflow coordinator.
//!
//! Discover → filter → copy, one table at a time in qualified-name order.
//! The first failed table ends the run.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::identifier::qualify_pg;
use crate::core::schema::{QualifiedName, TableDefinition};
use crate::core::traits::{SourceStore, TargetStore};
use crate::ddl;
use crate::error::Result;
use crate::filter::{self, DroppedTable, FilterOptions, FilterOutcome};
use crate::source::MssqlPool;
use crate::target::PgPool;
use crate::transfer::BatchCopier;

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: MssqlPool,
    target: PgPool,
}

/// Rows copied into one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub table: QualifiedName,
    pub rows: u64,
    /// Rows rejected under the skip policy.
    pub rows_skipped: u64,
    pub elapsed_ms: u64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed` or `dry_run`.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub completed_at: DateTime<Utc>,

    /// Tables that survived filtering, in copy order.
    pub planned: Vec<QualifiedName>,

    /// Tables removed by the filter pipeline.
    pub dropped: Vec<DroppedTable>,

    pub tables_planned: usize,
    pub tables_copied: usize,
    pub rows_copied: u64,
    pub rows_skipped: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    pub tables: Vec<TableResult>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Orchestrator {
    /// Open and verify both connection pools.
    pub async fn new(config: Config) -> Result<Self> {
        let source = MssqlPool::new(config.source.clone()).await?;
        let target = PgPool::new(&config.target).await?;
        Ok(Self {
            config,
            source,
            target,
        })
    }

    /// Run the migration. With `dry_run` the table plan is returned without
    /// copying anything.
    pub async fn run(&self, dry_run: bool) -> Result<MigrationResult> {
        info!("Configuration hash: {}", self.config.hash());
        run_migration(&self.source, &self.target, &self.config.migration, dry_run).await
    }
}

/// Generate PostgreSQL DDL for the selected tables, write it to `output` and
/// return it. Only the source store is contacted.
pub async fn generate_schema(config: &Config, output: &Path) -> Result<String> {
    info!("Configuration hash: {}", config.hash());
    let source = MssqlPool::new(config.source.clone()).await?;
    let script = render_source_schema(&source, &config.migration).await?;
    std::fs::write(output, &script)?;
    info!("Schema written to {}", output.display());
    Ok(script)
}

/// Discover tables and run the full filter pipeline.
pub async fn plan_tables(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    config: &MigrationConfig,
) -> Result<FilterOutcome> {
    let opts = FilterOptions::from_config(config)?;
    let schemas = filter::effective_schemas(&config.schemas, config.include_system_schemas);
    info!("Discovering tables in schemas: {}", schemas.join(", "));

    let discovered = source.list_tables(&schemas).await?;
    info!("Found {} tables", discovered.len());

    filter::filter_tables(source, target, discovered, &opts).await
}

/// Plan, then copy every planned table in order.
pub async fn run_migration(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    config: &MigrationConfig,
    dry_run: bool,
) -> Result<MigrationResult> {
    let started_at = Utc::now();
    let started = Instant::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting migration run: {}", run_id);

    let plan = plan_tables(source, target, config).await?;

    let mut tables = Vec::with_capacity(plan.kept.len());
    if dry_run {
        info!("Dry run: {} tables would be copied", plan.kept.len());
        for table in &plan.kept {
            info!("  {}", table);
        }
    } else {
        let copier = BatchCopier::from_config(config);
        let total = plan.kept.len();
        for (i, table) in plan.kept.iter().enumerate() {
            info!("[{}/{}] Copying {}", i + 1, total, table);
            tables.push(copy_one(source, target, &copier, config, table).await?);
        }
    }

    let completed_at = Utc::now();
    let duration = started.elapsed().as_secs_f64();
    let rows_copied: u64 = tables.iter().map(|t| t.rows).sum();
    let rows_skipped: u64 = tables.iter().map(|t| t.rows_skipped).sum();
    let rows_per_second = if duration > 0.0 {
        (rows_copied as f64 / duration) as u64
    } else {
        0
    };

    let result = MigrationResult {
        run_id,
        status: if dry_run { "dry_run" } else { "completed" }.to_string(),
        duration_seconds: duration,
        started_at,
        completed_at,
        tables_planned: plan.kept.len(),
        tables_copied: tables.len(),
        planned: plan.kept,
        dropped: plan.dropped,
        rows_copied,
        rows_skipped,
        rows_per_second,
        tables,
    };

    info!(
        "Migration {}: {} tables, {} rows in {:.1}s ({} rows/s)",
        result.status,
        result.tables_copied,
        result.rows_copied,
        result.duration_seconds,
        result.rows_per_second
    );

    Ok(result)
}

async fn copy_one(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    copier: &BatchCopier,
    config: &MigrationConfig,
    table: &QualifiedName,
) -> Result<TableResult> {
    let columns = source.load_columns(table).await?;

    if config.truncate {
        let qualified = qualify_pg(&table.schema, &table.name, config.quote_mode())?;
        match target.truncate(&qualified).await {
            Ok(()) => info!("{}: truncated target table", table),
            Err(e) => warn!("{}: truncate failed, copying anyway: {}", table, e),
        }
    }

    let stats = copier.copy_table(source, target, table, &columns).await?;
    Ok(TableResult {
        table: table.clone(),
        rows: stats.rows,
        rows_skipped: stats.skipped,
        elapsed_ms: stats.elapsed.as_millis() as u64,
    })
}

/// Read the catalog for the name-filtered table set and render DDL.
pub async fn render_source_schema(
    source: &dyn SourceStore,
    config: &MigrationConfig,
) -> Result<String> {
    let opts = FilterOptions::from_config(config)?;
    let schemas = filter::effective_schemas(&config.schemas, config.include_system_schemas);
    let discovered = source.list_tables(&schemas).await?;
    let selected = filter::filter_names(discovered, &opts);

    let mut definitions = Vec::with_capacity(selected.kept.len());
    for table in selected.kept {
        let columns = source.load_columns(&table).await?;
        let primary_key = source.load_primary_key(&table).await?;
        definitions.push(TableDefinition {
            table,
            columns,
            primary_key,
        });
    }
    info!("Generating DDL for {} tables", definitions.len());

    ddl::render_schema(&definitions, config.quote_mode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{column, numbered_rows, FakeSource, FakeTarget};
    use crate::error::MigrateError;
    use crate::filter::DropReason;

    fn qn(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn two_columns() -> Vec<crate::core::schema::Column> {
        vec![column("Id", "bigint", 1), column("Name", "nvarchar", 2)]
    }

    fn source() -> FakeSource {
        FakeSource::default()
            .with_table(qn("dbo.Customer"), two_columns(), numbered_rows(2500))
            .with_table(qn("dbo.Empty"), two_columns(), vec![])
            .with_table(qn("dbo.log_events"), two_columns(), numbered_rows(3))
            .with_table(qn("dbo.sysdiagrams"), two_columns(), numbered_rows(1))
            .with_table(qn("sales.Orders"), two_columns(), numbered_rows(10))
    }

    fn config() -> MigrationConfig {
        MigrationConfig {
            schemas: vec!["dbo".into(), "sales".into()],
            exclude_tables: vec!["log_*".into()],
            exclude_empty_tables: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_copies_planned_tables_in_order() {
        let source = source();
        let target = FakeTarget::default();

        let result = run_migration(&source, &target, &config(), false).await.unwrap();

        assert_eq!(result.status, "completed");
        assert_eq!(result.planned, vec![qn("dbo.Customer"), qn("sales.Orders")]);
        assert_eq!(result.tables_copied, 2);
        assert_eq!(result.rows_copied, 2510);
        assert_eq!(result.tables[0].rows, 2500);
        assert_eq!(target.commits(), vec![1000, 1000, 500, 10]);

        assert!(result
            .dropped
            .iter()
            .any(|d| d.table == qn("dbo.Empty") && d.reason == DropReason::Empty));
        assert!(result
            .dropped
            .iter()
            .any(|d| d.table == qn("dbo.sysdiagrams") && d.reason == DropReason::SystemTable));
    }

    #[tokio::test]
    async fn test_dry_run_copies_nothing() {
        let source = source();
        let target = FakeTarget::default();

        let result = run_migration(&source, &target, &config(), true).await.unwrap();

        assert_eq!(result.status, "dry_run");
        assert_eq!(result.tables_planned, 2);
        assert_eq!(result.tables_copied, 0);
        assert!(target.events().is_empty());
        assert!(!source.recorded().iter().any(|q| q.starts_with("select")));
    }

    #[tokio::test]
    async fn test_copy_failure_stops_run() {
        let source = source();
        let target = FakeTarget {
            fail_insert_at: Some(1500),
            ..Default::default()
        };

        let err = run_migration(&source, &target, &config(), false)
            .await
            .unwrap_err();

        assert_eq!(err.rows_committed(), Some(1000));
        // sales.Orders is never started.
        assert!(!source
            .recorded()
            .iter()
            .any(|q| q.contains("[sales].[Orders]")));
    }

    #[tokio::test]
    async fn test_truncate_failure_is_not_fatal() {
        let source = source();
        let target = FakeTarget {
            fail_truncate: true,
            ..Default::default()
        };
        let config = MigrationConfig {
            truncate: true,
            ..config()
        };

        let result = run_migration(&source, &target, &config, false).await.unwrap();
        assert_eq!(result.tables_copied, 2);
    }

    #[tokio::test]
    async fn test_truncate_uses_target_quoting() {
        let source = source();
        let target = FakeTarget::default();
        let config = MigrationConfig {
            truncate: true,
            preserve_case: true,
            ..config()
        };

        run_migration(&source, &target, &config, false).await.unwrap();

        let truncated = target.truncated.lock().unwrap().clone();
        assert_eq!(truncated, vec!["\"dbo\".\"Customer\"", "\"sales\".\"Orders\""]);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_fatal() {
        let source = FakeSource {
            fail_catalog: true,
            ..Default::default()
        };
        let target = FakeTarget::default();

        let err = run_migration(&source, &target, &config(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Metadata { .. }));
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let source = source();
        let target = FakeTarget::default();

        let result = run_migration(&source, &target, &config(), true).await.unwrap();
        let json = result.to_json().unwrap();

        assert!(json.contains("\"run_id\""));
        assert!(json.contains("\"reason\": \"empty\""));
    }

    #[tokio::test]
    async fn test_schema_render_uses_catalog() {
        let mut source = source();
        source
            .primary_keys
            .insert(qn("sales.Orders"), vec!["Id".to_string()]);

        let script = render_source_schema(&source, &config()).await.unwrap();

        assert!(script.contains("CREATE SCHEMA IF NOT EXISTS sales;"));
        assert!(script.contains("CREATE TABLE sales.Orders ("));
        assert!(script.contains("PRIMARY KEY (Id)"));
        assert!(!script.contains("log_events"));
        assert!(!script.contains("sysdiagrams"));
    }
}
