use crate::domains::export::layout::{ColumnLayout, ColumnRole};
use crate::domains::export::line_protocol::{tag_value, timestamp_nanos};
use crate::errors::SerializationError;
use crate::types::Scalar;
use std::collections::HashMap;

/// Header row: `name` followed by the natural response columns
pub fn csv_headers(layout: &ColumnLayout) -> Vec<String> {
    let mut headers = Vec::with_capacity(layout.header_total() + 1);
    headers.push("name".to_string());
    headers.extend(layout.csv_header_columns().iter().cloned());
    headers
}

/// Flatten one row to `[measurement, timestamp, natural columns...]`.
///
/// Missing and null values become empty strings. A synthetic cast column
/// fills its field only when it carries a value.
pub fn csv_record(
    measurement: &str,
    layout: &ColumnLayout,
    values: &[Scalar],
    row: usize,
) -> Result<Vec<String>, SerializationError> {
    let header = layout.csv_header_columns();
    let mut cells: HashMap<&str, String> = HashMap::with_capacity(header.len());
    let mut timestamp = None;

    for (index, (role, value)) in layout.roles().iter().zip(values).enumerate() {
        match role {
            ColumnRole::Time => timestamp = Some(timestamp_nanos(value, row)?),
            ColumnRole::Tag(key) => {
                let tag = tag_value(value, key, row)?.unwrap_or_default();
                cells.insert(key.as_str(), tag.to_string());
            }
            ColumnRole::Field { name, .. } => {
                let natural = index < header.len();
                if natural || !value.is_null() {
                    cells.insert(name.as_str(), value.to_string());
                }
            }
            ColumnRole::Ignored => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| SerializationError::Timestamp {
        row,
        found: "nothing".to_string(),
    })?;

    let mut record = Vec::with_capacity(header.len() + 1);
    record.push(measurement.to_string());
    record.push(timestamp.to_string());
    for column in header.iter().skip(1) {
        record.push(cells.remove(column.as_str()).unwrap_or_default());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldType, FieldTypeMap, TagKeySet};

    fn layout(columns: &[&str], tags: &[&str], fields: &[(&str, FieldType)], casts: usize) -> ColumnLayout {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let tags: TagKeySet = tags.iter().map(|t| t.to_string()).collect();
        let types: FieldTypeMap = fields.iter().map(|(n, t)| (n.to_string(), *t)).collect();
        ColumnLayout::new(&columns, &tags, &types, types.len(), casts)
    }

    #[test]
    fn test_headers_and_record() {
        let layout = layout(
            &["time", "host", "usage", "value", "value_1"],
            &["host"],
            &[("usage", FieldType::Float), ("value", FieldType::Float)],
            1,
        );
        assert_eq!(csv_headers(&layout), vec!["name", "time", "host", "usage", "value"]);

        let row = vec![
            Scalar::Integer(1000),
            Scalar::Null,
            Scalar::Float(0.5),
            Scalar::Null,
            Scalar::String("n/a".into()),
        ];
        assert_eq!(
            csv_record("cpu", &layout, &row, 0).unwrap(),
            vec!["cpu", "1000", "", "0.5", "n/a"]
        );
    }

    #[test]
    fn test_null_cast_column_keeps_primary_value() {
        let layout = layout(&["time", "value", "value_1"], &[], &[("value", FieldType::Integer)], 1);
        let row = vec![Scalar::Integer(1), Scalar::Integer(42), Scalar::Null];
        assert_eq!(csv_record("m", &layout, &row, 0).unwrap(), vec!["m", "1", "42"]);
    }

    #[test]
    fn test_ignored_columns_render_empty() {
        let layout = layout(&["time", "mystery", "value"], &[], &[("value", FieldType::Boolean)], 0);
        // header_total counts only known field keys, so the header stops at `mystery`
        let row = vec![Scalar::Integer(1), Scalar::String("?".into()), Scalar::Bool(false)];
        assert_eq!(csv_headers(&layout), vec!["name", "time", "mystery"]);
        assert_eq!(csv_record("m", &layout, &row, 0).unwrap(), vec!["m", "1", ""]);
    }

    #[test]
    fn test_non_string_tag_is_an_error() {
        let layout = layout(&["time", "host"], &["host"], &[], 0);
        let row = vec![Scalar::Integer(1), Scalar::Float(1.0)];
        assert!(csv_record("m", &layout, &row, 2).is_err());
    }
}
