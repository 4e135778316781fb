//! Field type reconciliation.
//!
//! A field may be stored with different types in different shards. A plain
//! `SELECT *` then returns only the values of the type that comes first in
//! float, integer, string, boolean order (after casting integers to float), so
//! the values of the other types are silently dropped. For every ambiguous field
//! we pick one canonical output type and, where needed, request an extra
//! explicit cast column so the dropped values come back too.

use crate::domains::export::types::CastOverrides;
use crate::types::{FieldKeyMap, FieldType, FieldTypeMap};
use crate::validation::escape_identifier;

/// Canonical types plus the select clauses needed to fetch every value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub field_types: FieldTypeMap,
    /// Always starts with `*`, followed by one explicit cast per ambiguous field
    pub select_clauses: Vec<String>,
}

impl Reconciliation {
    pub fn select_clause(&self) -> String {
        self.select_clauses.join(", ")
    }

    /// Number of synthetic cast columns appended to the response
    pub fn cast_column_count(&self) -> usize {
        self.select_clauses.len().saturating_sub(1)
    }
}

fn cast_clause(field: &str, to: FieldType) -> String {
    format!("\"{}\"::{}", escape_identifier(field), to)
}

/// Resolve one canonical type per field and the extra cast clauses
pub fn reconcile(field_keys: &FieldKeyMap, overrides: &CastOverrides) -> Reconciliation {
    let mut field_types = FieldTypeMap::new();
    let mut select_clauses = vec!["*".to_string()];

    for (field, types) in field_keys {
        let canonical = match types.len() {
            0 => continue,
            1 => match types.iter().next() {
                Some(only) => *only,
                None => continue,
            },
            _ => {
                let has_float = types.contains(&FieldType::Float);
                let has_integer = types.contains(&FieldType::Integer);
                if has_float || has_integer {
                    // Integers are promoted to float by the server itself; booleans are discarded
                    if types.contains(&FieldType::String) {
                        select_clauses.push(cast_clause(field, FieldType::String));
                    }
                    if has_float {
                        FieldType::Float
                    } else {
                        FieldType::Integer
                    }
                } else {
                    select_clauses.push(cast_clause(field, FieldType::Boolean));
                    FieldType::Boolean
                }
            }
        };
        field_types.insert(field.clone(), canonical);
    }

    for (field, field_type) in field_types.iter_mut() {
        if *field_type == FieldType::String {
            if let Some(forced) = overrides.override_for(field) {
                *field_type = forced;
            }
        }
    }

    Reconciliation {
        field_types,
        select_clauses,
    }
}
