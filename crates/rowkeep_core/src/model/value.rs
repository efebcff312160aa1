//! Scalar values stored in entity columns.

use crate::schema::FieldType;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

/// One column value, typed by the semantic field types of the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// Backs both `Integer` and `Long` fields.
    Integer(i64),
    /// Stored as `0`/`1`.
    Boolean(bool),
    Text(String),
    Real(f64),
}

impl FieldValue {
    /// Decodes a raw SQLite value according to the declared field type.
    ///
    /// Booleans follow the storage convention `value > 0`. `NULL` always
    /// decodes to `FieldValue::Null`.
    pub fn from_column(field_type: FieldType, raw: ValueRef<'_>) -> Result<Self, String> {
        if let ValueRef::Null = raw {
            return Ok(Self::Null);
        }

        match (field_type, raw) {
            (FieldType::Integer | FieldType::Long, ValueRef::Integer(value)) => {
                Ok(Self::Integer(value))
            }
            (FieldType::Boolean, ValueRef::Integer(value)) => Ok(Self::Boolean(value > 0)),
            (FieldType::Real, ValueRef::Real(value)) => Ok(Self::Real(value)),
            (FieldType::Real, ValueRef::Integer(value)) => Ok(Self::Real(value as f64)),
            (FieldType::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
                .map(|text| Self::Text(text.to_string()))
                .map_err(|err| format!("text column is not valid UTF-8: {err}")),
            (FieldType::Text, ValueRef::Integer(value)) => Ok(Self::Text(value.to_string())),
            (FieldType::Text, ValueRef::Real(value)) => Ok(Self::Text(value.to_string())),
            (expected, other) => Err(format!(
                "cannot decode {:?} column as {expected:?}",
                other.data_type()
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Boolean(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Integer(value) => Some(*value > 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Consumes a text value; `NULL` becomes the empty string.
    pub fn into_text(self) -> Result<String, String> {
        match self {
            Self::Text(value) => Ok(value),
            Self::Null => Ok(String::new()),
            other => Err(format!("expected text value, got {other:?}")),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(value) => ToSqlOutput::Borrowed(ValueRef::Integer(*value)),
            Self::Boolean(value) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*value))),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Real(value) => ToSqlOutput::Borrowed(ValueRef::Real(*value)),
        })
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::FieldValue;
    use crate::schema::FieldType;
    use rusqlite::types::ValueRef;

    #[test]
    fn booleans_decode_from_positive_integers() {
        assert_eq!(
            FieldValue::from_column(FieldType::Boolean, ValueRef::Integer(3)).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            FieldValue::from_column(FieldType::Boolean, ValueRef::Integer(0)).unwrap(),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn null_decodes_for_every_type() {
        for field_type in [
            FieldType::Integer,
            FieldType::Long,
            FieldType::Boolean,
            FieldType::Text,
            FieldType::Real,
        ] {
            assert!(FieldValue::from_column(field_type, ValueRef::Null)
                .unwrap()
                .is_null());
        }
    }

    #[test]
    fn text_in_integer_column_is_rejected() {
        let err = FieldValue::from_column(FieldType::Integer, ValueRef::Text(b"seven")).unwrap_err();
        assert!(err.contains("Integer"));
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".to_string()));
    }
}
