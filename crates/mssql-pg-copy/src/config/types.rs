//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQL Server).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Copy behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQL Server) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt the TDS connection (default: false).
    #[serde(default)]
    pub encrypt: bool,

    /// Trust the server certificate when encrypting (default: true).
    #[serde(default = "default_true")]
    pub trust_server_cert: bool,

    /// Connection pool bounds.
    #[serde(default)]
    pub pool: PoolConfig,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Connection pool bounds.
    #[serde(default)]
    pub pool: PoolConfig,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Connection pool bounds shared by source and target.
///
/// Pooling is for surviving dropped connections; the copy loop only ever
/// holds one connection per store at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum open connections.
    #[serde(default = "default_max_open")]
    pub max_open: u32,

    /// Connections kept warm while idle.
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,

    /// Maximum lifetime of a connection in seconds (at least 1).
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,

    /// Dial/acquire timeout in seconds (at least 1).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: default_max_open(),
            max_idle: default_max_idle(),
            max_lifetime_secs: default_max_lifetime_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl PoolConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Copy behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source schemas to copy from (default: dbo).
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,

    /// Keep SQL Server system schemas and `sys*` tables.
    #[serde(default)]
    pub include_system_schemas: bool,

    /// Only copy these tables (`schema.table`, case-insensitive). Empty = all.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Skip tables matching these glob patterns (`*` wildcard).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Skip tables with no rows.
    #[serde(default)]
    pub exclude_empty_tables: bool,

    /// Skip tables with more rows than this (0 = no limit).
    #[serde(default)]
    pub exclude_large_tables: i64,

    /// Skip tables larger than this many MB on disk (0 = no limit).
    #[serde(default)]
    pub max_table_size_mb: i64,

    /// Skip tables that already hold rows in the target.
    #[serde(default)]
    pub skip_if_exists: bool,

    /// Rows per target transaction (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Truncate each target table before copying into it.
    #[serde(default)]
    pub truncate: bool,

    /// Wrap target identifiers in double quotes so their case is preserved.
    #[serde(default)]
    pub preserve_case: bool,

    /// What to do when a single row fails to insert (default: abort).
    #[serde(default)]
    pub on_row_error: RowErrorPolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            schemas: default_schemas(),
            include_system_schemas: false,
            tables: Vec::new(),
            exclude_tables: Vec::new(),
            exclude_empty_tables: false,
            exclude_large_tables: 0,
            max_table_size_mb: 0,
            skip_if_exists: false,
            batch_size: default_batch_size(),
            truncate: false,
            preserve_case: false,
            on_row_error: RowErrorPolicy::default(),
        }
    }
}

impl MigrationConfig {
    /// Row ceiling, if enabled.
    pub fn row_ceiling(&self) -> Option<i64> {
        (self.exclude_large_tables > 0).then_some(self.exclude_large_tables)
    }

    /// Size ceiling in MB, if enabled.
    pub fn size_ceiling_mb(&self) -> Option<i64> {
        (self.max_table_size_mb > 0).then_some(self.max_table_size_mb)
    }
}

/// Policy for a row whose INSERT is rejected by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Roll back the open batch and fail the run.
    #[default]
    Abort,

    /// Roll back just the rejected row (via savepoint), log it, and continue.
    Skip,
}

impl std::str::FromStr for RowErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(RowErrorPolicy::Abort),
            "skip" => Ok(RowErrorPolicy::Skip),
            other => Err(format!(
                "invalid row error policy '{}', expected abort or skip",
                other
            )),
        }
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_open() -> u32 {
    10
}

fn default_max_idle() -> u32 {
    5
}

fn default_max_lifetime_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_schemas() -> Vec<String> {
    vec!["dbo".to_string()]
}

fn default_batch_size() -> usize {
    1000
}
