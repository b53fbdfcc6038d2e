//! Decoding of untyped view rows into ordered JSON records.
//!
//! The view's column set is not known at compile time, so each column is
//! decoded by its PostgreSQL type name. Keys keep the view's column order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::BigDecimal;
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo};
use uuid::Uuid;

/// One row of the dataset: column name -> value
pub type RowRecord = Map<String, Value>;

pub fn row_to_record(row: &PgRow) -> RowRecord {
    let mut map = Map::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode_column(row: &PgRow, idx: usize, ty: &PgTypeInfo) -> Value {
    match ty.name() {
        "BOOL" => get::<bool>(row, idx).map(Value::Bool),
        "INT2" => get::<i16>(row, idx).map(Value::from),
        "INT4" => get::<i32>(row, idx).map(Value::from),
        "INT8" => get::<i64>(row, idx).map(Value::from),
        "FLOAT4" => get::<f32>(row, idx).map(|v| float(v as f64)),
        "FLOAT8" => get::<f64>(row, idx).map(float),
        "NUMERIC" => get::<BigDecimal>(row, idx).map(|v| numeric(&v)),
        "UUID" => get::<Uuid>(row, idx).map(|v| Value::String(v.to_string())),
        "DATE" => get::<NaiveDate>(row, idx).map(|v| Value::String(date(&v))),
        "TIME" => get::<NaiveTime>(row, idx).map(|v| Value::String(time(&v))),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx).map(|v| Value::String(iso_naive(&v))),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => get::<String>(row, idx).map(Value::String),

        "BOOL[]" => array::<bool>(row, idx, Value::Bool),
        "INT2[]" => array::<i16>(row, idx, Value::from),
        "INT4[]" => array::<i32>(row, idx, Value::from),
        "INT8[]" => array::<i64>(row, idx, Value::from),
        "FLOAT4[]" => array::<f32>(row, idx, |v| float(v as f64)),
        "FLOAT8[]" => array::<f64>(row, idx, float),
        "NUMERIC[]" => array::<BigDecimal>(row, idx, |v| numeric(&v)),
        "UUID[]" => array::<Uuid>(row, idx, |v| Value::String(v.to_string())),
        "DATE[]" => array::<NaiveDate>(row, idx, |v| Value::String(date(&v))),
        "TIMESTAMP[]" => array::<NaiveDateTime>(row, idx, |v| Value::String(iso_naive(&v))),
        "TIMESTAMPTZ[]" => array::<DateTime<Utc>>(row, idx, |v| Value::String(v.to_rfc3339())),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => array::<String>(row, idx, Value::String),

        name if is_text_backed(name, ty) => text_unchecked(row, idx),
        name => {
            tracing::debug!("Unsupported column type {}; returning null", name);
            None
        }
    }
    .unwrap_or(Value::Null)
}

/// NULL and undecodable values both come back as `None`
fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Column {} failed to decode: {}", idx, e);
            None
        }
    }
}

/// One-dimensional arrays; NULL elements stay `null`
fn array<'r, T>(row: &'r PgRow, idx: usize, element: impl Fn(T) -> Value) -> Option<Value>
where
    Vec<Option<T>>: Decode<'r, Postgres> + Type<Postgres>,
{
    get::<Vec<Option<T>>>(row, idx)
        .map(|items| Value::Array(items.into_iter().map(|v| v.map_or(Value::Null, &element)).collect()))
}

/// Types whose binary wire form is plain UTF-8 text
fn is_text_backed(name: &str, ty: &PgTypeInfo) -> bool {
    name.eq_ignore_ascii_case("citext") || matches!(ty.kind(), PgTypeKind::Enum(_))
}

fn text_unchecked(row: &PgRow, idx: usize) -> Option<Value> {
    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(v) => v.map(Value::String),
        Err(e) => {
            tracing::debug!("Column {} failed to decode as text: {}", idx, e);
            None
        }
    }
}

fn date(v: &NaiveDate) -> String {
    v.format("%Y-%m-%d").to_string()
}

fn time(v: &NaiveTime) -> String {
    v.format("%H:%M:%S%.f").to_string()
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// NUMERIC becomes an integer when it has no fractional part, else a float
fn numeric(v: &BigDecimal) -> Value {
    let text = v.to_string();
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    text.parse::<f64>().map(float).unwrap_or(Value::String(text))
}

/// ISO-8601 without offset; fractional seconds only when present
pub fn iso_naive(v: &NaiveDateTime) -> String {
    v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}
