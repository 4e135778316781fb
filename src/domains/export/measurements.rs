use crate::backend::QueryClient;
use crate::domains::export::types::ExportJob;
use crate::errors::QueryResult;
use crate::validation::{has_wildcard, wildcard_match, MeasurementRange};
use log::debug;
use std::collections::HashSet;

/// Drop repeated names, keeping the first occurrence
pub fn dedup_measurements(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Server measurements matching any of `patterns`, each at most once, in server order
pub fn filter_measurements(available: &[String], patterns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    available
        .iter()
        .filter(|name| patterns.iter().any(|pattern| wildcard_match(pattern, name)))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Resolve the measurement list a run works on.
///
/// An empty `requested` list means every measurement of the database. A list
/// with wildcards is matched against the server; a plain list is used in the
/// given order with repeats removed, since every name maps to one output file.
pub async fn resolve_measurements(
    client: &dyn QueryClient,
    database: &str,
    requested: &[String],
) -> QueryResult<Vec<String>> {
    if requested.is_empty() {
        return client.measurements(database).await;
    }
    if requested.iter().any(|m| has_wildcard(m)) {
        let available = client.measurements(database).await?;
        let matched = filter_measurements(&available, requested);
        debug!("{} of {} measurements match {:?}", matched.len(), available.len(), requested);
        return Ok(matched);
    }
    Ok(dedup_measurements(requested))
}

/// One job per measurement inside the optional range; positions index the full list
pub fn select_jobs(measurements: &[String], range: Option<MeasurementRange>) -> Vec<ExportJob> {
    measurements
        .iter()
        .enumerate()
        .filter(|(index, _)| range.map_or(true, |r| r.contains(*index)))
        .map(|(index, name)| ExportJob::new(index, name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use async_trait::async_trait;
    use reqwest::Method;

    struct ListingClient {
        body: &'static str,
    }

    #[async_trait]
    impl QueryClient for ListingClient {
        async fn query(&self, _: Method, _: &str, statement: &str, _: &str) -> QueryResult<Vec<u8>> {
            if statement != "show measurements" {
                return Err(QueryError::remote(format!("unexpected statement {}", statement)));
            }
            Ok(self.body.as_bytes().to_vec())
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    const LISTING: &str = r#"{"results":[{"statement_id":0,"series":[{"name":"measurements","columns":["name"],"values":[["cpu"],["cpu_load"],["disk"],["mem"]]}]}]}"#;

    #[tokio::test]
    async fn test_resolve_all_measurements() {
        let client = ListingClient { body: LISTING };
        let all = resolve_measurements(&client, "telegraf", &[]).await.unwrap();
        assert_eq!(all, names(&["cpu", "cpu_load", "disk", "mem"]));
    }

    #[tokio::test]
    async fn test_resolve_wildcards_deduplicates_in_server_order() {
        let client = ListingClient { body: LISTING };
        let matched = resolve_measurements(&client, "telegraf", &names(&["mem", "cpu*", "c?u"]))
            .await
            .unwrap();
        assert_eq!(matched, names(&["cpu", "cpu_load", "mem"]));
    }

    #[tokio::test]
    async fn test_resolve_plain_list_skips_server() {
        let client = ListingClient { body: "not json" };
        let plain = resolve_measurements(&client, "telegraf", &names(&["mem", "missing"]))
            .await
            .unwrap();
        assert_eq!(plain, names(&["mem", "missing"]));
    }

    #[tokio::test]
    async fn test_resolve_plain_list_drops_repeats() {
        let client = ListingClient { body: "not json" };
        let plain = resolve_measurements(&client, "telegraf", &names(&["mem", "cpu", "mem", "cpu"]))
            .await
            .unwrap();
        assert_eq!(plain, names(&["mem", "cpu"]));
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let client = ListingClient { body: r#"{"error":"database not found: nope"}"# };
        let err = resolve_measurements(&client, "nope", &[]).await.unwrap_err();
        assert!(matches!(err, QueryError::Remote { .. }));
    }

    #[test]
    fn test_select_jobs_with_range() {
        let all = names(&["a", "b", "c", "d"]);
        let jobs = select_jobs(&all, Some(MeasurementRange::parse("2,3").unwrap()));
        assert_eq!(jobs, vec![ExportJob::new(1, "b"), ExportJob::new(2, "c")]);

        let jobs = select_jobs(&all, Some(MeasurementRange::parse(",2").unwrap()));
        assert_eq!(jobs.len(), 2);
        assert_eq!(select_jobs(&all, None).len(), 4);
    }
}
