//! Decoding of TDS row values into [`SqlValue`].
//!
//! Values are decoded from what the driver actually sent, not from the
//! column's declared type, so a cell always round-trips as the driver
//! produced it.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{numeric::Numeric, ColumnData, FromSql};

use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Decode every column of a TDS row, in column order.
pub fn decode_row(row: tiberius::Row) -> Result<Row> {
    row.into_iter().map(decode_column).collect()
}

/// Decode one TDS column value.
pub fn decode_column(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(i16::from(v))),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v.map(|s| SqlValue::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v.map(|b| SqlValue::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(numeric_value),
        ColumnData::Xml(v) => v.map(|x| SqlValue::String(x.into_owned().into_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map(SqlValue::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map(SqlValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map(SqlValue::Time),
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(&data)?.map(SqlValue::DateTimeOffset)
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(MigrateError::Config(format!(
                "unsupported source column value: {:?}",
                other
            )))
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

// Precision beyond what Decimal holds is carried as text.
fn numeric_value(n: Numeric) -> SqlValue {
    match Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale())) {
        Ok(d) => SqlValue::Decimal(d),
        Err(_) => SqlValue::String(n.to_string()),
    }
}
