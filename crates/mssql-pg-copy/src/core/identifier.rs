//! Identifier validation and quoting for the two stores.
//!
//! Identifiers cannot be bound as statement parameters, so every table and
//! column name that ends up in generated SQL passes through this module.
//! SQL Server names are always bracket-quoted. PostgreSQL names follow the
//! configured [`QuoteMode`].

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted from the source catalog.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - SQL Server: 128 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// How PostgreSQL identifiers are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteMode {
    /// Emit names as-is and let the server fold them to lower case.
    ///
    /// Names that are not plain identifiers (spaces, punctuation, leading
    /// digit) are emitted quoted in their lower-cased form so they resolve to
    /// the same relation an unquoted name would.
    #[default]
    Bare,

    /// Wrap every name in double quotes, preserving its case.
    Quoted,
}

/// Validate an identifier for security issues.
///
/// Rejects empty names, names containing null bytes and names longer than
/// [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a SQL Server table name with its schema.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Quote a PostgreSQL identifier according to `mode`.
///
/// ```ignore
/// assert_eq!(quote_pg("Customer", QuoteMode::Quoted)?, "\"Customer\"");
/// assert_eq!(quote_pg("Customer", QuoteMode::Bare)?, "Customer");
/// assert_eq!(quote_pg("Order Lines", QuoteMode::Bare)?, "\"order lines\"");
/// ```
pub fn quote_pg(name: &str, mode: QuoteMode) -> Result<String> {
    validate_identifier(name)?;
    match mode {
        QuoteMode::Quoted => Ok(double_quote(name)),
        QuoteMode::Bare if is_plain_identifier(name) => Ok(name.to_string()),
        QuoteMode::Bare => Ok(double_quote(&name.to_lowercase())),
    }
}

/// Qualify a PostgreSQL table name with its schema.
pub fn qualify_pg(schema: &str, table: &str, mode: QuoteMode) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema, mode)?, quote_pg(table, mode)?))
}

fn double_quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// True if `name` can appear unquoted in PostgreSQL: a letter or underscore
/// followed by letters, digits, underscores or dollar signs.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
