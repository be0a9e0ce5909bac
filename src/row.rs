// ABOUTME: Owned value and row types shared by accessors and transfer runners
// ABOUTME: Provides column projection and watermark id extraction

use crate::accessor::AccessorError;
use std::collections::HashMap;

/// A single dynamically-typed table cell.
///
/// Mirrors the SQLite storage classes, which is the lowest common
/// denominator this crate needs:
/// - INTEGER → `Integer(i64)`
/// - REAL → `Real(f64)`
/// - TEXT → `Text(String)`
/// - BLOB → `Blob(Vec<u8>)`
/// - NULL → `Null`
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        match value {
            rusqlite::types::Value::Null => Value::Null,
            rusqlite::types::Value::Integer(i) => Value::Integer(i),
            rusqlite::types::Value::Real(f) => Value::Real(f),
            rusqlite::types::Value::Text(s) => Value::Text(s),
            rusqlite::types::Value::Blob(b) => Value::Blob(b),
        }
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => rusqlite::types::Value::Null,
            Value::Integer(i) => rusqlite::types::Value::Integer(i),
            Value::Real(f) => rusqlite::types::Value::Real(f),
            Value::Text(s) => rusqlite::types::Value::Text(s),
            Value::Blob(b) => rusqlite::types::Value::Blob(b),
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// One table row: column name → value.
pub type Row = HashMap<String, Value>;

/// Project a row to exactly the resolved column set.
///
/// Every transferred row is reduced to the columns introspected from the
/// source schema, in that order, before insertion. A column missing from a
/// fetched row means the source schema changed mid-run.
pub fn project(row: &Row, columns: &[String]) -> Result<Vec<Value>, AccessorError> {
    columns
        .iter()
        .map(|col| {
            row.get(col).cloned().ok_or_else(|| {
                AccessorError::Schema(format!("fetched row is missing column '{}'", col))
            })
        })
        .collect()
}

/// Extract the integer identifier used as the incremental watermark.
///
/// The id column must be present and hold an INTEGER; anything else is a
/// schema error since the incremental contract requires a strictly
/// increasing integer identifier.
pub fn integer_id(row: &Row, id_column: &str) -> Result<i64, AccessorError> {
    match row.get(id_column) {
        Some(Value::Integer(id)) => Ok(*id),
        Some(other) => Err(AccessorError::Schema(format!(
            "id column '{}' holds a non-integer value: {:?}",
            id_column, other
        ))),
        None => Err(AccessorError::Schema(format!(
            "id column '{}' is missing from fetched row",
            id_column
        ))),
    }
}
