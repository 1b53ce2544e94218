//! Configuration validation.

use super::{Config, PoolConfig};
use crate::core::schema::QualifiedName;
use crate::error::{MigrateError, Result};
use crate::filter::ExcludeSet;
use crate::target::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    // Cannot copy into the same database
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    validate_pool("source", &config.source.pool)?;
    validate_pool("target", &config.target.pool)?;

    let migration = &config.migration;
    if migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if migration.schemas.iter().all(|s| s.trim().is_empty()) {
        return Err(MigrateError::Config(
            "migration.schemas must name at least one schema".into(),
        ));
    }
    if migration.exclude_large_tables < 0 {
        return Err(MigrateError::Config(
            "migration.exclude_large_tables cannot be negative".into(),
        ));
    }
    if migration.max_table_size_mb < 0 {
        return Err(MigrateError::Config(
            "migration.max_table_size_mb cannot be negative".into(),
        ));
    }
    for entry in &migration.tables {
        QualifiedName::parse(entry)?;
    }
    ExcludeSet::new(&migration.exclude_tables)?;

    Ok(())
}

/// Pool bounds. Lifetime and connect timeout must be non-zero.
pub fn validate_pool(name: &str, pool: &PoolConfig) -> Result<()> {
    if pool.max_open == 0 {
        return Err(MigrateError::Config(format!(
            "{}.pool.max_open must be at least 1",
            name
        )));
    }
    if pool.max_idle > pool.max_open {
        return Err(MigrateError::Config(format!(
            "{}.pool.max_idle ({}) cannot exceed max_open ({})",
            name, pool.max_idle, pool.max_open
        )));
    }
    if pool.max_lifetime_secs == 0 {
        return Err(MigrateError::Config(format!(
            "{}.pool.max_lifetime_secs must be at least 1",
            name
        )));
    }
    if pool.connect_timeout_secs == 0 {
        return Err(MigrateError::Config(format!(
            "{}.pool.connect_timeout_secs must be at least 1",
            name
        )));
    }
    Ok(())
}
