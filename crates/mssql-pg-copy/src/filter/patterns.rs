//! Name matching: exclude globs and SQL Server system objects.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::core::schema::QualifiedName;
use crate::error::{MigrateError, Result};

/// Schemas owned by SQL Server itself.
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "sys",
    "INFORMATION_SCHEMA",
    "db_owner",
    "db_accessadmin",
    "db_securityadmin",
    "db_ddladmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_denydatareader",
    "db_denydatawriter",
];

/// Schema used when every configured schema was filtered out.
pub const DEFAULT_SCHEMA: &str = "dbo";

pub fn is_system_schema(schema: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(schema))
}

/// Tables whose name starts with `sys` are treated as system tables.
pub fn is_system_table(table: &QualifiedName) -> bool {
    table
        .name
        .get(..3)
        .map(|prefix| prefix.eq_ignore_ascii_case("sys"))
        .unwrap_or(false)
}

/// Schemas to discover tables in.
///
/// Entries are trimmed and blanks removed. Unless `include_system` is set,
/// system schemas are removed; if nothing is left the list falls back to
/// [`DEFAULT_SCHEMA`].
pub fn effective_schemas(configured: &[String], include_system: bool) -> Vec<String> {
    let mut schemas: Vec<String> = Vec::new();
    for schema in configured.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !include_system && is_system_schema(schema) {
            warn!("Ignoring system schema '{}'", schema);
            continue;
        }
        if !schemas.iter().any(|s| s.eq_ignore_ascii_case(schema)) {
            schemas.push(schema.to_string());
        }
    }

    if schemas.is_empty() {
        warn!(
            "No user schemas left to copy from, falling back to '{}'",
            DEFAULT_SCHEMA
        );
        schemas.push(DEFAULT_SCHEMA.to_string());
    }
    schemas
}

/// Compiled exclude patterns.
///
/// `*` matches any run of characters and is the only wildcard; every other
/// character, including `?`, `[` and `{`, matches itself. Patterns are
/// compared case-insensitively against `schema.table`. A pattern with no `.` is also
/// compared against the bare table name, so `log_*` excludes
/// `dbo.log_events`.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    qualified: GlobSet,
    bare: GlobSet,
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut qualified = GlobSetBuilder::new();
        let mut bare = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let pattern = raw.trim();
            if pattern.is_empty() {
                return Err(MigrateError::Config(
                    "exclude pattern cannot be empty".into(),
                ));
            }
            let glob = GlobBuilder::new(&star_only_glob(pattern))
                .case_insensitive(true)
                .literal_separator(false)
                .backslash_escape(false)
                .build()
                .map_err(|e| {
                    MigrateError::Config(format!("invalid exclude pattern '{}': {}", pattern, e))
                })?;

            if !pattern.contains('.') {
                bare.add(glob.clone());
            }
            qualified.add(glob);
            kept.push(pattern.to_string());
        }

        let build = |builder: GlobSetBuilder| {
            builder
                .build()
                .map_err(|e| MigrateError::Config(format!("invalid exclude patterns: {}", e)))
        };

        Ok(Self {
            patterns: kept,
            qualified: build(qualified)?,
            bare: build(bare)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The first pattern matching `table`, if any.
    pub fn matching_pattern(&self, table: &QualifiedName) -> Option<&str> {
        let full = table.to_string();
        let index = self
            .qualified
            .matches(&full)
            .into_iter()
            .chain(self.bare_matches(&table.name))
            .min()?;
        self.patterns.get(index).map(String::as_str)
    }

    pub fn is_match(&self, table: &QualifiedName) -> bool {
        self.matching_pattern(table).is_some()
    }

    // Indices in the bare set skip dotted patterns; map them back to
    // positions in `patterns`.
    fn bare_matches(&self, name: &str) -> Vec<usize> {
        let bare_positions: Vec<usize> = self
            .patterns
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.contains('.'))
            .map(|(i, _)| i)
            .collect();
        self.bare
            .matches(name)
            .into_iter()
            .filter_map(|i| bare_positions.get(i).copied())
            .collect()
    }
}

/// Escape everything but `*` so globset treats the rest literally.
fn star_only_glob(pattern: &str) -> String {
    pattern
        .split('*')
        .map(globset::escape)
        .collect::<Vec<_>>()
        .join("*")
}

impl Default for ExcludeSet {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            qualified: GlobSet::empty(),
            bare: GlobSet::empty(),
        }
    }
}
