use crate::errors::{QueryError, QueryResult};
use crate::types::{FieldKeyMap, FieldType, Scalar};
use serde::Deserialize;

/// One named table of a query result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Scalar>>,
}

impl Series {
    pub fn new(name: &str, columns: &[&str], values: Vec<Vec<Scalar>>) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    fn check_row_widths(&self) -> QueryResult<()> {
        for (index, row) in self.values.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(QueryError::Decode(format!(
                    "series '{}' row {} has {} values for {} columns",
                    self.name,
                    index,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

/// Top-level `/query` response body
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

impl Response {
    pub fn from_bytes(raw: &[u8]) -> QueryResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// First error message carried by the envelope or any statement
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|r| r.error.as_deref()))
            .filter(|message| !message.is_empty())
    }
}

/// Parse a raw response body into its series.
///
/// An empty sequence is a valid answer and means there is nothing to export.
pub fn parse_series(raw: &[u8]) -> QueryResult<Vec<Series>> {
    let response = Response::from_bytes(raw)?;
    if let Some(message) = response.error_message() {
        return Err(QueryError::remote(message));
    }

    let series: Vec<Series> = response
        .results
        .into_iter()
        .flat_map(|result| result.series)
        .collect();
    for s in &series {
        s.check_row_widths()?;
    }
    Ok(series)
}

/// Column-0 strings of every row, e.g. measurement names or tag keys
pub fn first_column_strings(series: &[Series]) -> QueryResult<Vec<String>> {
    let mut values = Vec::new();
    for s in series {
        for row in &s.values {
            match row.first() {
                Some(Scalar::String(value)) => values.push(value.clone()),
                Some(other) => {
                    return Err(QueryError::Decode(format!(
                        "series '{}' holds a {} where a name was expected",
                        s.name,
                        other.kind()
                    )))
                }
                None => {}
            }
        }
    }
    Ok(values)
}

/// Fold `show field keys` rows of `[fieldKey, fieldType]` into a FieldKeyMap.
///
/// The same key shows up once per distinct type when shards disagree.
pub fn field_key_map(series: &[Series]) -> QueryResult<FieldKeyMap> {
    let mut field_keys = FieldKeyMap::new();
    for s in series {
        for row in &s.values {
            let (Some(key), Some(field_type)) = (
                row.first().and_then(Scalar::as_str),
                row.get(1).and_then(Scalar::as_str),
            ) else {
                return Err(QueryError::decode(format!(
                    "malformed field key row in series '{}'",
                    s.name
                )));
            };
            let field_type: FieldType = field_type.parse().map_err(QueryError::Decode)?;
            field_keys
                .entry(key.to_string())
                .or_default()
                .insert(field_type);
        }
    }
    Ok(field_keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_series() {
        let body = br#"{"results":[{"statement_id":0,"series":[{"name":"cpu","columns":["time","host","value"],"values":[[1000000000,"a",3],[2000000000,null,4.5]]}]}]}"#;
        let series = parse_series(body).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "cpu");
        assert_eq!(series[0].columns, vec!["time", "host", "value"]);
        assert_eq!(series[0].values[0][2], Scalar::Integer(3));
        assert_eq!(series[0].values[1][1], Scalar::Null);
        assert_eq!(series[0].values[1][2], Scalar::Float(4.5));
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let series = parse_series(br#"{"results":[{"statement_id":0}]}"#).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_statement_error_is_remote_error() {
        let err = parse_series(br#"{"results":[{"statement_id":0,"error":"database not found: db"}]}"#)
            .unwrap_err();
        assert_eq!(err, QueryError::remote("database not found: db"));

        let err = parse_series(br#"{"error":"authorization failed"}"#).unwrap_err();
        assert!(matches!(err, QueryError::Remote { ref message, .. } if message == "authorization failed"));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(parse_series(b"not json"), Err(QueryError::Decode(_))));

        let short_row = br#"{"results":[{"series":[{"name":"m","columns":["time","a"],"values":[[1]]}]}]}"#;
        assert!(matches!(parse_series(short_row), Err(QueryError::Decode(_))));
    }

    #[test]
    fn test_field_key_map_accumulates_shard_types() {
        let series = vec![Series::new(
            "cpu",
            &["fieldKey", "fieldType"],
            vec![
                vec![Scalar::String("value".into()), Scalar::String("float".into())],
                vec![Scalar::String("value".into()), Scalar::String("string".into())],
                vec![Scalar::String("state".into()), Scalar::String("boolean".into())],
            ],
        )];
        let map = field_key_map(&series).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["value"].len(), 2);
        assert!(map["value"].contains(&FieldType::String));
        assert!(map["state"].contains(&FieldType::Boolean));
    }

    #[test]
    fn test_field_key_map_rejects_unknown_type() {
        let series = vec![Series::new(
            "cpu",
            &["fieldKey", "fieldType"],
            vec![vec![Scalar::String("v".into()), Scalar::String("unsigned".into())]],
        )];
        assert!(matches!(field_key_map(&series), Err(QueryError::Decode(_))));
    }

    #[test]
    fn test_first_column_strings() {
        let series = vec![
            Series::new("cpu", &["tagKey"], vec![vec![Scalar::String("host".into())]]),
            Series::new("cpu", &["tagKey"], vec![vec![Scalar::String("region".into())]]),
        ];
        assert_eq!(first_column_strings(&series).unwrap(), vec!["host", "region"]);

        let bad = vec![Series::new("m", &["name"], vec![vec![Scalar::Integer(1)]])];
        assert!(first_column_strings(&bad).is_err());
    }
}
