use crate::types::{FieldType, FieldTypeMap, TagKeySet};

/// What a response column carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    Time,
    Tag(String),
    Field { name: String, field_type: FieldType },
    /// Not a known tag or field; dropped from the output
    Ignored,
}

/// Per-series mapping from response columns to roles, built once per measurement
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: Vec<String>,
    roles: Vec<ColumnRole>,
    header_total: usize,
}

/// Strip the `_<digits>` suffix the server appends to a duplicated column name
pub fn strip_cast_suffix(column: &str) -> &str {
    match column.rfind('_') {
        Some(idx)
            if idx + 1 < column.len() && column[idx + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &column[..idx]
        }
        _ => column,
    }
}

impl ColumnLayout {
    /// `cast_columns` is the number of explicit cast clauses in the query;
    /// only that many trailing columns are treated as synthetic.
    pub fn new(
        columns: &[String],
        tag_keys: &TagKeySet,
        field_types: &FieldTypeMap,
        field_key_count: usize,
        cast_columns: usize,
    ) -> Self {
        let first_cast = columns.len().saturating_sub(cast_columns).max(1);
        let roles = columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                if index == 0 {
                    return ColumnRole::Time;
                }
                if tag_keys.contains(column) {
                    return ColumnRole::Tag(column.clone());
                }
                let name = if index >= first_cast {
                    strip_cast_suffix(column)
                } else {
                    column.as_str()
                };
                match field_types.get(name) {
                    Some(field_type) => ColumnRole::Field {
                        name: name.to_string(),
                        field_type: *field_type,
                    },
                    None => ColumnRole::Ignored,
                }
            })
            .collect();

        Self {
            columns: columns.to_vec(),
            roles,
            header_total: 1 + tag_keys.len() + field_key_count,
        }
    }

    pub fn roles(&self) -> &[ColumnRole] {
        &self.roles
    }

    /// Number of natural columns: time, every tag key and every field key
    pub fn header_total(&self) -> usize {
        self.header_total
    }

    /// Leading columns that form the CSV header, clamped to what the server returned
    pub fn csv_header_columns(&self) -> &[String] {
        &self.columns[..self.header_total.min(self.columns.len())]
    }
}
