//! # mssql-pg-copy
//!
//! Batched, transactional table copy from Microsoft SQL Server to PostgreSQL.
//!
//! - **Table filtering** by include list, exclude globs, row count, size and
//!   target state
//! - **Bounded transactions**: rows are committed every `batch_size` rows, so
//!   a failure loses at most one batch
//! - **Type mapping** from SQL Server to PostgreSQL for DDL generation
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_pg_copy::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mssql_pg_copy::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Copied {} rows", result.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, RowErrorPolicy, SourceConfig, TargetConfig};
pub use self::core::{Column, QualifiedName, QuoteMode, SqlValue};
pub use error::{MigrateError, Result};
pub use orchestrator::{generate_schema, MigrationResult, Orchestrator, TableResult};
pub use source::MssqlPool;
pub use target::PgPool;
pub use transfer::{BatchCopier, CopyStats};
