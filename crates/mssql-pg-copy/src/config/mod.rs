//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub(crate) use validation::validate_pool;

use crate::core::identifier::QuoteMode;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, used to correlate runs in logs.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl MigrationConfig {
    /// Identifier quoting mode for the target store.
    pub fn quote_mode(&self) -> QuoteMode {
        if self.preserve_case {
            QuoteMode::Quoted
        } else {
            QuoteMode::Bare
        }
    }
}

/// Split a comma-separated CLI list into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  host: mssql.local
  database: Sales
  user: sa
  password: secret
target:
  host: pg.local
  database: sales
  user: postgres
  password: secret
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.port, 1433);
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.migration.batch_size, 1000);
        assert_eq!(config.migration.schemas, vec!["dbo".to_string()]);
        assert_eq!(config.migration.on_row_error, RowErrorPolicy::Abort);
        assert_eq!(config.source.pool.max_open, 10);
        assert_eq!(config.source.pool.max_idle, 5);
        assert_eq!(config.source.pool.max_lifetime_secs, 300);
        assert_eq!(config.migration.quote_mode(), QuoteMode::Bare);
        assert_eq!(config.migration.row_ceiling(), None);
        assert_eq!(config.migration.size_ceiling_mb(), None);
    }

    #[test]
    fn test_migration_section_parsed() {
        let yaml = format!(
            "{}migration:\n  schemas: [dbo, sales]\n  batch_size: 250\n  exclude_tables: ['log_*']\n  preserve_case: true\n  on_row_error: skip\n  exclude_large_tables: 5000\n",
            MINIMAL
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.schemas, vec!["dbo", "sales"]);
        assert_eq!(config.migration.batch_size, 250);
        assert_eq!(config.migration.exclude_tables, vec!["log_*"]);
        assert_eq!(config.migration.quote_mode(), QuoteMode::Quoted);
        assert_eq!(config.migration.on_row_error, RowErrorPolicy::Skip);
        assert_eq!(config.migration.row_ceiling(), Some(5000));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Config::from_yaml("source: [").is_err());
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Config::from_yaml(MINIMAL).unwrap();
        let b = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(a.hash(), b.hash());

        let mut c = a.clone();
        c.migration.batch_size = 10;
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" dbo.A, sales.B ,,"),
            vec!["dbo.A".to_string(), "sales.B".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_row_error_policy_from_str() {
        assert_eq!("ABORT".parse::<RowErrorPolicy>(), Ok(RowErrorPolicy::Abort));
        assert_eq!("skip".parse::<RowErrorPolicy>(), Ok(RowErrorPolicy::Skip));
        assert!("retry".parse::<RowErrorPolicy>().is_err());
    }
}
