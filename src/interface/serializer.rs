//! Converts rows of a dynamic table to and from JSON objects.

use super::resolver::RowAccessor;
use crate::core::{Column, DataType, FieldErrors, InterfaceError, Result, Row, Value};
use serde_json::{Map, Number, Value as JsonValue};

const UNKNOWN_COLUMN: &str = "Unknown column.";
const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";

/// Serializer bound to the columns a table had when it was resolved.
#[derive(Debug, Clone)]
pub struct RowSerializer {
    name: String,
    columns: Vec<Column>,
}

impl RowSerializer {
    pub fn build(accessor: &RowAccessor, name_hint: &str) -> Self {
        Self {
            name: format!("{}Serializer", name_hint),
            columns: accessor.schema().columns().to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Renders a stored row as an object keyed by column name, in column order.
    pub fn to_wire(&self, row: &Row) -> Map<String, JsonValue> {
        self.columns
            .iter()
            .zip(row)
            .map(|(column, value)| (column.name.clone(), render(column, value)))
            .collect()
    }

    /// Validates a client object and returns the values to insert.
    ///
    /// Every offending key is reported, not just the first. Generated key columns
    /// are read-only and silently skipped.
    pub fn from_wire(&self, fields: &Map<String, JsonValue>) -> Result<Vec<(String, Value)>> {
        let mut errors = FieldErrors::new();
        let mut values = Vec::with_capacity(fields.len());

        for key in fields.keys() {
            if !self.columns.iter().any(|col| &col.name == key) {
                errors.insert(key.clone(), vec![UNKNOWN_COLUMN.to_string()]);
            }
        }

        for column in &self.columns {
            if column.auto_increment {
                continue;
            }
            match fields.get(&column.name) {
                None if column.is_required() => {
                    errors.insert(column.name.clone(), vec![REQUIRED.to_string()]);
                }
                None => {}
                Some(JsonValue::Null) if !column.nullable => {
                    errors.insert(column.name.clone(), vec![NOT_NULL.to_string()]);
                }
                Some(JsonValue::Null) => values.push((column.name.clone(), Value::Null)),
                Some(raw) => match coerce(column, raw) {
                    Ok(value) => values.push((column.name.clone(), value)),
                    Err(message) => {
                        errors.insert(column.name.clone(), vec![message]);
                    }
                },
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            Err(InterfaceError::Validation(errors))
        }
    }
}

fn render(column: &Column, value: &Value) -> JsonValue {
    match (column.data_type, value) {
        (DataType::Boolean, Value::Integer(i)) => JsonValue::Bool(*i != 0),
        (_, Value::Null) => JsonValue::Null,
        (_, Value::Integer(i)) => JsonValue::from(*i),
        (_, Value::Float(f)) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        (_, Value::Text(s)) => JsonValue::String(s.clone()),
        (_, Value::Boolean(b)) => JsonValue::Bool(*b),
        (_, Value::Blob(bytes)) => JsonValue::String(hex::encode(bytes)),
    }
}

fn coerce(column: &Column, raw: &JsonValue) -> std::result::Result<Value, String> {
    // Untyped columns take any scalar as given.
    if column.declared_type.trim().is_empty() {
        return coerce_untyped(raw);
    }

    match column.data_type {
        DataType::Integer => coerce_integer(raw).ok_or_else(|| "A valid integer is required.".to_string()),
        DataType::Float => coerce_float(raw).ok_or_else(|| "A valid number is required.".to_string()),
        DataType::Numeric => coerce_integer(raw)
            .or_else(|| coerce_float(raw))
            .ok_or_else(|| "A valid number is required.".to_string()),
        DataType::Boolean => coerce_boolean(raw).ok_or_else(|| "Must be a valid boolean.".to_string()),
        DataType::Blob => match raw {
            JsonValue::String(s) => hex::decode(s.trim())
                .map(Value::Blob)
                .map_err(|_| "Must be a valid hex string.".to_string()),
            _ => Err("Must be a valid hex string.".to_string()),
        },
        DataType::Text => {
            let text = match raw {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                _ => return Err("Not a valid string.".to_string()),
            };
            match column.max_length {
                Some(limit) if text.chars().count() > limit => Err(format!(
                    "Ensure this field has no more than {} characters.",
                    limit
                )),
                _ => Ok(Value::Text(text)),
            }
        }
    }
}

fn coerce_integer(raw: &JsonValue) -> Option<Value> {
    match raw {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .map(Value::Integer)
}

fn coerce_float(raw: &JsonValue) -> Option<Value> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
    .map(Value::Float)
}

fn coerce_boolean(raw: &JsonValue) -> Option<Value> {
    match raw {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
    .map(Value::Boolean)
}

fn coerce_untyped(raw: &JsonValue) -> std::result::Result<Value, String> {
    match raw {
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::Number(n) => Ok(n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null)),
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        _ => Err("Nested values are not supported.".to_string()),
    }
}
