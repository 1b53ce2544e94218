//! PostgreSQL DDL generation for the `schema` command.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::core::identifier::{qualify_pg, quote_pg, QuoteMode};
use crate::core::schema::TableDefinition;
use crate::error::Result;
use crate::typemap::mssql_to_postgres;

/// `CREATE TABLE` for one table, columns in ordinal order.
pub fn create_table_sql(def: &TableDefinition, mode: QuoteMode) -> Result<String> {
    let mut lines = Vec::with_capacity(def.columns.len() + 1);
    for c in &def.columns {
        let null_clause = if c.is_nullable { "NULL" } else { "NOT NULL" };
        lines.push(format!(
            "    {} {} {}",
            quote_pg(&c.name, mode)?,
            mssql_to_postgres(&c.data_type),
            null_clause
        ));
    }

    if !def.primary_key.is_empty() {
        let pk_cols = def
            .primary_key
            .iter()
            .map(|c| quote_pg(c, mode))
            .collect::<Result<Vec<_>>>()?;
        lines.push(format!("    PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {} (\n{}\n);\n",
        qualify_pg(&def.table.schema, &def.table.name, mode)?,
        lines.join(",\n")
    ))
}

/// Render a complete schema script.
///
/// Tables are emitted sorted by qualified name, each schema is created once
/// before its first table. Tables without columns are skipped.
pub fn render_schema(definitions: &[TableDefinition], mode: QuoteMode) -> Result<String> {
    let mut sorted: Vec<&TableDefinition> = definitions.iter().collect();
    sorted.sort_by(|a, b| a.table.cmp(&b.table));

    let mut created: BTreeSet<&str> = BTreeSet::new();
    let mut out = String::new();

    for def in sorted {
        if def.columns.is_empty() {
            warn!("{}: no columns in catalog, skipping", def.table);
            continue;
        }
        if created.insert(def.table.schema.as_str()) {
            out.push_str(&format!(
                "CREATE SCHEMA IF NOT EXISTS {};\n\n",
                quote_pg(&def.table.schema, mode)?
            ));
        }
        out.push_str(&create_table_sql(def, mode)?);
        out.push('\n');
        debug!("Rendered DDL for {}", def.table);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, QualifiedName};

    fn col(name: &str, data_type: &str, nullable: bool, ordinal: i32) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: nullable,
            ordinal,
        }
    }

    fn orders() -> TableDefinition {
        TableDefinition {
            table: QualifiedName::new("sales", "Orders"),
            columns: vec![
                col("OrderId", "int", false, 1),
                col("PlacedAt", "datetime2", false, 2),
                col("Note", "sql_variant", true, 3),
            ],
            primary_key: vec!["OrderId".to_string()],
        }
    }

    #[test]
    fn test_create_table_bare() {
        let sql = create_table_sql(&orders(), QuoteMode::Bare).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE sales.Orders (\n    OrderId INTEGER NOT NULL,\n    PlacedAt TIMESTAMPTZ NOT NULL,\n    Note TEXT NULL,\n    PRIMARY KEY (OrderId)\n);\n"
        );
    }

    #[test]
    fn test_create_table_quoted_without_key() {
        let mut def = orders();
        def.primary_key.clear();
        let sql = create_table_sql(&def, QuoteMode::Quoted).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"sales\".\"Orders\" ("));
        assert!(sql.contains("\"OrderId\" INTEGER NOT NULL"));
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_schema_created_once_and_tables_sorted() {
        let customers = TableDefinition {
            table: QualifiedName::new("sales", "Customers"),
            columns: vec![col("Id", "bigint", false, 1)],
            primary_key: vec![],
        };
        let log = TableDefinition {
            table: QualifiedName::new("dbo", "Log"),
            columns: vec![col("Msg", "nvarchar", true, 1)],
            primary_key: vec![],
        };

        let script = render_schema(&[orders(), log, customers], QuoteMode::Bare).unwrap();

        assert_eq!(script.matches("CREATE SCHEMA IF NOT EXISTS sales;").count(), 1);
        let dbo = script.find("CREATE SCHEMA IF NOT EXISTS dbo;").unwrap();
        let log_at = script.find("CREATE TABLE dbo.Log").unwrap();
        let customers_at = script.find("CREATE TABLE sales.Customers").unwrap();
        let orders_at = script.find("CREATE TABLE sales.Orders").unwrap();
        assert!(dbo < log_at && log_at < customers_at && customers_at < orders_at);
    }

    #[test]
    fn test_table_without_columns_skipped() {
        let empty = TableDefinition {
            table: QualifiedName::new("dbo", "Ghost"),
            columns: vec![],
            primary_key: vec![],
        };
        let script = render_schema(&[empty], QuoteMode::Bare).unwrap();
        assert!(script.is_empty());
    }
}
