//! Table filter pipeline.
//!
//! Discovered tables pass through a fixed sequence of predicates:
//!
//! 1. system tables (`sys*`), unless system schemas are included
//! 2. include list, exact and case-insensitive
//! 3. exclude globs
//! 4. empty tables
//! 5. row-count ceiling
//! 6. on-disk size ceiling
//! 7. tables that already hold rows in the target
//!
//! Steps 1-3 look only at names. Steps 4-7 run over [`TableProbe`]s that are
//! fetched once, up front, for just the predicates that are enabled; the
//! predicates themselves do no I/O.

mod patterns;

pub use patterns::{
    effective_schemas, is_system_schema, is_system_table, ExcludeSet, DEFAULT_SCHEMA,
    SYSTEM_SCHEMAS,
};

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::core::identifier::{qualify_pg, QuoteMode};
use crate::core::schema::QualifiedName;
use crate::core::traits::{SourceStore, TargetStore};
use crate::error::Result;

/// Filter settings derived from the migration config.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub include_system_tables: bool,
    pub include: Vec<QualifiedName>,
    pub exclude: ExcludeSet,
    pub exclude_empty: bool,
    pub row_ceiling: Option<i64>,
    pub size_ceiling_mb: Option<i64>,
    pub skip_if_exists: bool,
    pub quote_mode: QuoteMode,
}

impl FilterOptions {
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        let include = config
            .tables
            .iter()
            .map(|t| QualifiedName::parse(t))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            include_system_tables: config.include_system_schemas,
            include,
            exclude: ExcludeSet::new(&config.exclude_tables)?,
            exclude_empty: config.exclude_empty_tables,
            row_ceiling: config.row_ceiling(),
            size_ceiling_mb: config.size_ceiling_mb(),
            skip_if_exists: config.skip_if_exists,
            quote_mode: config.quote_mode(),
        })
    }

    fn needs_row_count(&self) -> bool {
        self.exclude_empty || self.row_ceiling.is_some()
    }
}

/// Why a table was left out of the copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    SystemTable,
    NotIncluded,
    Excluded { pattern: String },
    Empty,
    TooManyRows { rows: i64, ceiling: i64 },
    TooLarge { size_mb: i64, ceiling_mb: i64 },
    AlreadyPopulated,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::SystemTable => write!(f, "system table"),
            DropReason::NotIncluded => write!(f, "not in include list"),
            DropReason::Excluded { pattern } => write!(f, "matches exclude pattern '{}'", pattern),
            DropReason::Empty => write!(f, "table is empty"),
            DropReason::TooManyRows { rows, ceiling } => {
                write!(f, "{} rows exceeds limit of {}", rows, ceiling)
            }
            DropReason::TooLarge {
                size_mb,
                ceiling_mb,
            } => write!(f, "{} MB exceeds limit of {} MB", size_mb, ceiling_mb),
            DropReason::AlreadyPopulated => write!(f, "target table already has rows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedTable {
    pub table: QualifiedName,
    #[serde(flatten)]
    pub reason: DropReason,
}

/// Tables kept and dropped by a filter stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub kept: Vec<QualifiedName>,
    pub dropped: Vec<DroppedTable>,
}

impl FilterOutcome {
    fn drop_table(&mut self, table: QualifiedName, reason: DropReason) {
        info!("Skipping table {}: {}", table, reason);
        self.dropped.push(DroppedTable { table, reason });
    }
}

/// Pre-fetched facts about one table. `None` means the probe was not needed
/// or its query failed; either way the predicate keeps the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProbe {
    pub row_count: Option<i64>,
    pub size_mb: Option<i64>,
    pub target_populated: Option<bool>,
}

/// Apply the name predicates. Output is sorted and de-duplicated.
pub fn filter_names(tables: Vec<QualifiedName>, opts: &FilterOptions) -> FilterOutcome {
    let mut tables = tables;
    tables.sort();
    tables.dedup();

    let mut outcome = FilterOutcome::default();
    for table in tables {
        if !opts.include_system_tables && is_system_table(&table) {
            outcome.drop_table(table, DropReason::SystemTable);
            continue;
        }
        if !opts.include.is_empty() && !opts.include.iter().any(|i| i.eq_ignore_case(&table)) {
            outcome.drop_table(table, DropReason::NotIncluded);
            continue;
        }
        if let Some(pattern) = opts.exclude.matching_pattern(&table) {
            let pattern = pattern.to_string();
            outcome.drop_table(table, DropReason::Excluded { pattern });
            continue;
        }
        outcome.kept.push(table);
    }
    outcome
}

/// Fetch the probes needed by the enabled predicates.
///
/// Probe failures are logged and recorded as unknown. A target-side failure
/// usually means the table does not exist there yet.
pub async fn probe_tables(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    tables: &[QualifiedName],
    opts: &FilterOptions,
) -> Result<Vec<TableProbe>> {
    let mut probes = Vec::with_capacity(tables.len());

    for table in tables {
        let mut probe = TableProbe::default();

        if opts.needs_row_count() {
            match source.row_count(table).await {
                Ok(count) => probe.row_count = Some(count),
                Err(e) => warn!("Could not count rows of {}, keeping it: {}", table, e),
            }
        }

        if opts.size_ceiling_mb.is_some() {
            match source.size_mb(table).await {
                Ok(size) => probe.size_mb = Some(size),
                Err(e) => warn!("Could not get size of {}, keeping it: {}", table, e),
            }
        }

        if opts.skip_if_exists {
            let target_table = qualify_pg(&table.schema, &table.name, opts.quote_mode)?;
            match target.has_rows(&target_table).await {
                Ok(populated) => probe.target_populated = Some(populated),
                Err(e) => warn!(
                    "Target check for {} failed, treating as not yet created: {}",
                    target_table, e
                ),
            }
        }

        probes.push(probe);
    }

    Ok(probes)
}

/// Apply the probe predicates. `tables` and `probes` are parallel.
pub fn filter_probed(
    tables: Vec<QualifiedName>,
    probes: &[TableProbe],
    opts: &FilterOptions,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    let unknown = TableProbe::default();

    for (i, table) in tables.into_iter().enumerate() {
        let probe = probes.get(i).unwrap_or(&unknown);

        if opts.exclude_empty && probe.row_count == Some(0) {
            outcome.drop_table(table, DropReason::Empty);
            continue;
        }
        if let (Some(ceiling), Some(rows)) = (opts.row_ceiling, probe.row_count) {
            if rows > ceiling {
                outcome.drop_table(table, DropReason::TooManyRows { rows, ceiling });
                continue;
            }
        }
        if let (Some(ceiling_mb), Some(size_mb)) = (opts.size_ceiling_mb, probe.size_mb) {
            if size_mb > ceiling_mb {
                outcome.drop_table(table, DropReason::TooLarge { size_mb, ceiling_mb });
                continue;
            }
        }
        if opts.skip_if_exists && probe.target_populated == Some(true) {
            outcome.drop_table(table, DropReason::AlreadyPopulated);
            continue;
        }
        outcome.kept.push(table);
    }
    outcome
}

/// Run the full pipeline over a discovered table list.
pub async fn filter_tables(
    source: &dyn SourceStore,
    target: &dyn TargetStore,
    discovered: Vec<QualifiedName>,
    opts: &FilterOptions,
) -> Result<FilterOutcome> {
    let total = discovered.len();
    let by_name = filter_names(discovered, opts);
    let probes = probe_tables(source, target, &by_name.kept, opts).await?;
    let by_probe = filter_probed(by_name.kept, &probes, opts);

    let mut dropped = by_name.dropped;
    dropped.extend(by_probe.dropped);

    info!(
        "Filtered {} discovered tables: {} to copy, {} skipped",
        total,
        by_probe.kept.len(),
        dropped.len()
    );

    Ok(FilterOutcome {
        kept: by_probe.kept,
        dropped,
    })
}
