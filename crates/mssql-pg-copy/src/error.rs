//! Error types for the copy library.

use thiserror::Error;

/// Exit code for configuration errors (bad YAML, invalid table names, etc.).
pub const EXIT_CONFIG_ERROR: u8 = 1;

/// Exit code for connectivity and pool errors.
pub const EXIT_CONNECTION_ERROR: u8 = 3;

/// Exit code for catalog/metadata query failures.
pub const EXIT_METADATA_ERROR: u8 = 4;

/// Exit code for a failed table copy.
pub const EXIT_COPY_ERROR: u8 = 5;

/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error, detected before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store could not be reached at startup.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Source database (SQL Server) error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Target database (PostgreSQL) error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog query failed.
    #[error("Metadata query failed for {context}: {message}")]
    Metadata { context: String, message: String },

    /// A row's width does not match the table's column list.
    #[error("Column mismatch for table {table}: expected {expected} values, got {actual}")]
    ColumnMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Copy of a table failed after `rows_committed` rows were durably written.
    #[error("Copy failed for table {table} after {rows_committed} committed rows: {source}")]
    Copy {
        table: String,
        rows_committed: u64,
        #[source]
        source: Box<MigrateError>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Metadata error for a catalog query.
    pub fn metadata(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Metadata {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an error raised while copying `table`.
    pub fn copy(table: impl Into<String>, rows_committed: u64, source: MigrateError) -> Self {
        MigrateError::Copy {
            table: table.into(),
            rows_committed,
            source: Box::new(source),
        }
    }

    /// Rows durably committed before the failure, if this is a copy failure.
    pub fn rows_committed(&self) -> Option<u64> {
        match self {
            MigrateError::Copy { rows_committed, .. } => Some(*rows_committed),
            _ => None,
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection(_) | MigrateError::Pool { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Metadata { .. } | MigrateError::Source(_) => EXIT_METADATA_ERROR,
            MigrateError::Copy { .. }
            | MigrateError::ColumnMismatch { .. }
            | MigrateError::Target(_) => EXIT_COPY_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
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
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
