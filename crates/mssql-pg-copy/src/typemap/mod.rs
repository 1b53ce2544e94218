//! Type mapping from SQL Server column types to PostgreSQL.

/// Target type for any source type not in [`TYPE_MAP`].
pub const FALLBACK_TYPE: &str = "TEXT";

/// SQL Server type name (lower case) to PostgreSQL type name.
static TYPE_MAP: &[(&str, &str)] = &[
    // Integer types
    ("bigint", "BIGINT"),
    ("int", "INTEGER"),
    ("smallint", "SMALLINT"),
    ("tinyint", "SMALLINT"),
    // Boolean
    ("bit", "BOOLEAN"),
    // Character types
    ("char", "TEXT"),
    ("nchar", "TEXT"),
    ("varchar", "TEXT"),
    ("nvarchar", "TEXT"),
    ("text", "TEXT"),
    ("ntext", "TEXT"),
    // Date/time types
    ("datetime", "TIMESTAMPTZ"),
    ("datetime2", "TIMESTAMPTZ"),
    ("smalldatetime", "TIMESTAMPTZ"),
    ("datetimeoffset", "TIMESTAMPTZ"),
    ("date", "DATE"),
    ("time", "TIME"),
    // Floating point and exact numeric
    ("float", "DOUBLE PRECISION"),
    ("real", "REAL"),
    ("decimal", "NUMERIC"),
    ("numeric", "NUMERIC"),
    ("money", "NUMERIC"),
    ("smallmoney", "NUMERIC"),
    // GUID
    ("uniqueidentifier", "UUID"),
    // Binary types
    ("binary", "BYTEA"),
    ("varbinary", "BYTEA"),
    ("image", "BYTEA"),
];

/// Map a SQL Server type name to a PostgreSQL type name.
///
/// Lookup is case-insensitive. Unknown types map to [`FALLBACK_TYPE`].
pub fn mssql_to_postgres(mssql_type: &str) -> &'static str {
    let key = mssql_type.trim();
    TYPE_MAP
        .iter()
        .find(|(source, _)| source.eq_ignore_ascii_case(key))
        .map(|(_, target)| *target)
        .unwrap_or(FALLBACK_TYPE)
}
