//! Binding [`SqlValue`] cells to PostgreSQL statement parameters.
//!
//! The prepared INSERT tells us the type the server inferred for each
//! parameter. Pairs with a direct binary encoding are sent in binary; any
//! other pair is sent in text format so the server's input function for the
//! parameter type does the conversion. A value the target type cannot
//! represent fails the insert.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};

use crate::core::value::SqlValue;

type BoxError = Box<dyn Error + Sync + Send>;

impl SqlValue {
    /// Whether this value has a binary encoding for parameter type `ty`.
    fn binary_for(&self, ty: &Type) -> bool {
        let any_int = *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8;
        match self {
            SqlValue::Null => true,
            SqlValue::Bool(_) => *ty == Type::BOOL,
            SqlValue::I16(_) | SqlValue::I32(_) | SqlValue::I64(_) => any_int,
            SqlValue::F32(_) => *ty == Type::FLOAT4 || *ty == Type::FLOAT8,
            SqlValue::F64(_) => *ty == Type::FLOAT8,
            SqlValue::String(_) => <&str as ToSql>::accepts(ty),
            SqlValue::Bytes(_) => *ty == Type::BYTEA,
            SqlValue::Uuid(_) => *ty == Type::UUID,
            SqlValue::Decimal(_) => *ty == Type::NUMERIC,
            SqlValue::DateTime(_) | SqlValue::DateTimeOffset(_) => {
                *ty == Type::TIMESTAMP || *ty == Type::TIMESTAMPTZ
            }
            SqlValue::Date(_) => *ty == Type::DATE,
            SqlValue::Time(_) => *ty == Type::TIME,
        }
    }

    fn write_binary(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::I16(v) => write_int(self.kind(), i64::from(*v), ty, out),
            SqlValue::I32(v) => write_int(self.kind(), i64::from(*v), ty, out),
            SqlValue::I64(v) => write_int(self.kind(), *v, ty, out),
            SqlValue::F32(v) if *ty == Type::FLOAT4 => v.to_sql(ty, out),
            SqlValue::F32(v) => f64::from(*v).to_sql(ty, out),
            SqlValue::F64(v) => v.to_sql(ty, out),
            SqlValue::String(v) => v.as_str().to_sql(ty, out),
            SqlValue::Bytes(v) => v.as_slice().to_sql(ty, out),
            SqlValue::Uuid(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            // SQL Server datetimes carry no zone; they are taken as UTC.
            SqlValue::DateTime(v) if *ty == Type::TIMESTAMPTZ => {
                DateTime::<Utc>::from_naive_utc_and_offset(*v, Utc).to_sql(ty, out)
            }
            SqlValue::DateTime(v) => v.to_sql(ty, out),
            SqlValue::DateTimeOffset(v) if *ty == Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
            SqlValue::DateTimeOffset(v) => v.to_sql(ty, out),
            SqlValue::Date(v) => v.to_sql(ty, out),
            SqlValue::Time(v) => v.to_sql(ty, out),
        }
    }
}

fn write_int(kind: &str, v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(v)
            .map_err(|_| format!("{} value {} out of range for smallint", kind, v))?
            .to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)
            .map_err(|_| format!("{} value {} out of range for integer", kind, v))?
            .to_sql(ty, out)
    } else {
        v.to_sql(ty, out)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.binary_for(ty) {
            return self.write_binary(ty, out);
        }
        match self.to_pg_text() {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, ty: &Type) -> Format {
        if self.binary_for(ty) {
            Format::Binary
        } else {
            Format::Text
        }
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn encode(value: &SqlValue, ty: &Type) -> (Format, Result<IsNull, BoxError>, BytesMut) {
        let mut out = BytesMut::new();
        let result = value.to_sql(ty, &mut out);
        (value.encode_format(ty), result, out)
    }

    #[test]
    fn test_integer_widening_is_binary() {
        let (format, result, out) = encode(&SqlValue::I16(7), &Type::INT8);
        assert!(matches!(format, Format::Binary));
        assert!(matches!(result.unwrap(), IsNull::No));
        assert_eq!(&out[..], &7i64.to_be_bytes());
    }

    #[test]
    fn test_integer_narrowing_is_range_checked() {
        let (_, ok, out) = encode(&SqlValue::I64(300), &Type::INT2);
        assert!(ok.is_ok());
        assert_eq!(&out[..], &300i16.to_be_bytes());

        let (_, err, _) = encode(&SqlValue::I64(i64::from(i32::MAX) + 1), &Type::INT4);
        let message = err.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("i64 value 2147483648 out of range for integer"));

        let (_, err, _) = encode(&SqlValue::I32(-40_000), &Type::INT2);
        let message = err.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.starts_with("i32 value -40000"));
    }

    #[test]
    fn test_text_target_gets_rendered_text() {
        let (format, result, out) = encode(&SqlValue::I32(42), &Type::TEXT);
        assert!(matches!(format, Format::Text));
        assert!(result.is_ok());
        assert_eq!(&out[..], b"42");

        let uuid = uuid::Uuid::nil();
        let (format, _, out) = encode(&SqlValue::Uuid(uuid), &Type::VARCHAR);
        assert!(matches!(format, Format::Text));
        assert_eq!(&out[..], uuid.to_string().as_bytes());
    }

    #[test]
    fn test_string_into_numeric_column_uses_text() {
        let (format, result, out) = encode(&SqlValue::String("12.50".into()), &Type::NUMERIC);
        assert!(matches!(format, Format::Text));
        assert!(result.is_ok());
        assert_eq!(&out[..], b"12.50");
    }

    #[test]
    fn test_null_is_null_for_any_type() {
        for ty in [Type::INT4, Type::TEXT, Type::JSONB, Type::TIMESTAMPTZ] {
            let (_, result, out) = encode(&SqlValue::Null, &ty);
            assert!(matches!(result.unwrap(), IsNull::Yes));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_naive_datetime_into_timestamptz() {
        let ts = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 1)
            .unwrap();
        let (format, result, out) = encode(&SqlValue::DateTime(ts), &Type::TIMESTAMPTZ);
        assert!(matches!(format, Format::Binary));
        assert!(result.is_ok());
        // Microseconds since 2000-01-01 00:00:00 UTC.
        assert_eq!(&out[..], &1_000_000i64.to_be_bytes());
    }

    #[test]
    fn test_decimal_and_bool_binary() {
        let (format, result, _) = encode(&SqlValue::Decimal(Decimal::new(1995, 2)), &Type::NUMERIC);
        assert!(matches!(format, Format::Binary));
        assert!(result.is_ok());

        let (format, _, out) = encode(&SqlValue::Bool(true), &Type::BOOL);
        assert!(matches!(format, Format::Binary));
        assert_eq!(&out[..], &[1u8]);
    }

    #[test]
    fn test_bytes_into_text_column_is_hex() {
        let (format, _, out) = encode(&SqlValue::Bytes(vec![0x01, 0xff]), &Type::TEXT);
        assert!(matches!(format, Format::Text));
        assert_eq!(&out[..], b"\\x01ff");
    }
}
