//! Table and column metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MigrateError, Result};

/// A `(schema, name)` pair identifying a table.
///
/// Ordering is lexicographic by schema, then name, which is the order tables
/// are copied in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table`. Anything other than exactly two non-empty parts
    /// is a configuration error.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [schema, name] if !schema.trim().is_empty() && !name.trim().is_empty() => {
                Ok(Self::new(schema.trim(), name.trim()))
            }
            _ => Err(MigrateError::Config(format!(
                "invalid table name '{}', expected schema.table",
                s
            ))),
        }
    }

    /// Case-insensitive comparison used by the include list.
    pub fn eq_ignore_case(&self, other: &QualifiedName) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// One column of a source table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// SQL Server type name as reported by the catalog (e.g. `nvarchar`).
    pub data_type: String,

    /// Whether the column accepts NULL.
    pub is_nullable: bool,

    /// 1-based ordinal position.
    pub ordinal: i32,
}

/// Everything the DDL generator needs for one table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub table: QualifiedName,
    pub columns: Vec<Column>,
    /// Primary key column names in key order. Empty if the table has none.
    pub primary_key: Vec<String>,
}
