//! Conversion between Rust field types and dynamic SQL values.
//!
//! Every entity field declared through [`crate::define_entity!`] must
//! implement [`SqlType`]; the implementation decides the column type used in
//! generated DDL and how the field is read back from a [`crate::Record`].

use rusqlite::types::Value;

use crate::error::{DbError, Result};

/// Storage class of a column, as far as DDL generation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
}

impl ColumnType {
    pub const fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Real)
    }
}

/// A Rust type that can be stored in a single column.
pub trait SqlType: Sized {
    const COLUMN_TYPE: ColumnType;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    /// Reads the field back; `value` is `None` when the column was absent
    /// from the row.
    fn from_value(value: Option<&Value>, column: &str) -> Result<Self>;
}

fn mismatch(column: &str, expected: &str, found: Option<&Value>) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        reason: format!("expected {expected}, found {found:?}"),
    }
}

impl SqlType for i64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            Some(Value::Integer(v)) => Ok(*v),
            Some(Value::Text(s)) => s.parse().map_err(|_| mismatch(column, "integer", value)),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl SqlType for i32 {
    const COLUMN_TYPE: ColumnType = ColumnType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        let wide = i64::from_value(value, column)?;
        i32::try_from(wide).map_err(|_| mismatch(column, "32-bit integer", value))
    }
}

impl SqlType for bool {
    const COLUMN_TYPE: ColumnType = ColumnType::Boolean;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            Some(Value::Integer(v)) => Ok(*v != 0),
            other => Err(mismatch(column, "boolean", other)),
        }
    }
}

impl SqlType for f64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            Some(Value::Real(v)) => Ok(*v),
            Some(Value::Integer(v)) => Ok(*v as f64),
            other => Err(mismatch(column, "real", other)),
        }
    }
}

impl SqlType for String {
    const COLUMN_TYPE: ColumnType = ColumnType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            Some(Value::Text(s)) => Ok(s.clone()),
            Some(Value::Integer(v)) => Ok(v.to_string()),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl SqlType for Vec<u8> {
    const COLUMN_TYPE: ColumnType = ColumnType::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            Some(Value::Blob(b)) => Ok(b.clone()),
            other => Err(mismatch(column, "blob", other)),
        }
    }
}

impl<T: SqlType> SqlType for Option<T> {
    const COLUMN_TYPE: ColumnType = T::COLUMN_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Option<&Value>, column: &str) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(None),
            some => T::from_value(some, column).map(Some),
        }
    }
}

/// Renders a value the way link columns are compared: integers and text
/// render bare, so `10` and `"10"` compare equal.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// A value that can identify a row: non-null and not rendering as `"0"`.
pub fn is_usable(value: &Value) -> bool {
    !matches!(value, Value::Null) && value_text(value) != "0"
}

/// A value that takes part in query-by-example matching.
pub(crate) fn is_set(value: &Value) -> bool {
    match value {
        Value::Text(s) => !s.is_empty(),
        other => is_usable(other),
    }
}
