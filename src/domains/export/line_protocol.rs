//! Line protocol rendering: `measurement,tag=v field=v timestamp`.

use crate::domains::export::layout::{ColumnLayout, ColumnRole};
use crate::errors::SerializationError;
use crate::types::{FieldType, Scalar};
use crate::validation::quote_ident;
use chrono::DateTime;

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut result = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if special.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Measurement names escape commas and spaces
pub fn escape_measurement(name: &str) -> String {
    escape_chars(name, &[',', ' '])
}

/// Tag keys, tag values and field keys escape commas, equals signs and spaces
pub fn escape_tag(value: &str) -> String {
    escape_chars(value, &[',', '=', ' '])
}

/// String field values escape double quotes and backslashes
pub fn escape_string_field(value: &str) -> String {
    escape_chars(value, &['"', '\\'])
}

/// Header written at the top of a non-merged export and of `merge.txt`
pub fn dml_header(database: &str) -> String {
    [
        "# DDL".to_string(),
        format!("CREATE DATABASE {} WITH NAME autogen", quote_ident(database)),
        "# DML".to_string(),
        format!("# CONTEXT-DATABASE:{}", database),
        "# CONTEXT-RETENTION-POLICY:autogen".to_string(),
    ]
    .join("\n")
}

/// Epoch nanoseconds from the time column
pub fn timestamp_nanos(value: &Scalar, row: usize) -> Result<i64, SerializationError> {
    let invalid = |found: String| SerializationError::Timestamp { row, found };
    match value {
        Scalar::Integer(ns) => Ok(*ns),
        Scalar::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .and_then(|ts| ts.timestamp_nanos_opt())
            .ok_or_else(|| invalid(format!("'{}'", text))),
        other => Err(invalid(other.kind().to_string())),
    }
}

/// Tag values are always strings in the source store
pub fn tag_value<'a>(
    value: &'a Scalar,
    column: &str,
    row: usize,
) -> Result<Option<&'a str>, SerializationError> {
    match value {
        Scalar::Null => Ok(None),
        Scalar::String(s) => Ok(Some(s)),
        other => Err(SerializationError::TagValue {
            row,
            column: column.to_string(),
            found: other.kind().to_string(),
        }),
    }
}

fn field_value(
    value: &Scalar,
    name: &str,
    field_type: FieldType,
    row: usize,
) -> Result<String, SerializationError> {
    match field_type {
        FieldType::Float | FieldType::Boolean => Ok(value.to_string()),
        FieldType::Integer => Ok(format!("{}i", value)),
        FieldType::String => match value {
            Scalar::String(s) => Ok(format!("\"{}\"", escape_string_field(s))),
            other => Err(SerializationError::StringField {
                row,
                field: name.to_string(),
                found: other.kind().to_string(),
            }),
        },
    }
}

/// Render one row as a line protocol line.
///
/// A row without any non-null field still yields a line with an empty field
/// segment; such rows are kept rather than dropped.
pub fn serialize_row(
    measurement: &str,
    layout: &ColumnLayout,
    values: &[Scalar],
    row: usize,
) -> Result<String, SerializationError> {
    let mut tag_set = vec![escape_measurement(measurement)];
    let mut field_set = Vec::new();
    let mut timestamp = None;

    for (role, value) in layout.roles().iter().zip(values) {
        match role {
            ColumnRole::Time => timestamp = Some(timestamp_nanos(value, row)?),
            ColumnRole::Tag(key) => {
                if let Some(tag) = tag_value(value, key, row)? {
                    tag_set.push(format!("{}={}", escape_tag(key), escape_tag(tag)));
                }
            }
            ColumnRole::Field { name, field_type } => {
                if !value.is_null() {
                    let rendered = field_value(value, name, *field_type, row)?;
                    field_set.push(format!("{}={}", escape_tag(name), rendered));
                }
            }
            ColumnRole::Ignored => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| SerializationError::Timestamp {
        row,
        found: "nothing".to_string(),
    })?;
    Ok(format!("{} {} {}", tag_set.join(","), field_set.join(","), timestamp))
}
