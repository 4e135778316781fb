use crate::backend::series::{field_key_map, first_column_strings, parse_series, Response};
use crate::config::ConnectionConfig;
use crate::errors::{QueryError, QueryResult};
use crate::types::FieldKeyMap;
use crate::validation::escape_identifier;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::{debug, error};
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use reqwest::{Client, Method};
use std::io::Read;
use std::time::Duration;

/// Timestamp precision requested for every data query
pub const NANOSECOND_PRECISION: &str = "ns";

/// Transport to the remote database's `/query` endpoint
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Run one statement and return the raw (decompressed) response body.
    /// Empty `database` or `precision` are left out of the request.
    async fn query(
        &self,
        method: Method,
        database: &str,
        statement: &str,
        precision: &str,
    ) -> QueryResult<Vec<u8>>;

    async fn measurements(&self, database: &str) -> QueryResult<Vec<String>> {
        let body = self.query(Method::GET, database, "show measurements", "").await?;
        first_column_strings(&parse_series(&body)?)
    }

    async fn tag_keys(&self, database: &str, measurement: &str) -> QueryResult<Vec<String>> {
        let statement = format!("show tag keys from \"{}\"", escape_identifier(measurement));
        let body = self.query(Method::GET, database, &statement, "").await?;
        first_column_strings(&parse_series(&body)?)
    }

    async fn field_keys(&self, database: &str, measurement: &str) -> QueryResult<FieldKeyMap> {
        let statement = format!("show field keys from \"{}\"", escape_identifier(measurement));
        let body = self.query(Method::GET, database, &statement, "").await?;
        field_key_map(&parse_series(&body)?)
    }
}

/// reqwest-backed client; one instance is shared by every export job
pub struct HttpQueryClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpQueryClient {
    pub fn new(connection: &ConnectionConfig) -> QueryResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(100)
            .danger_accept_invalid_certs(connection.ssl)
            .build()?;

        Ok(Self {
            client,
            base_url: connection.base_url(),
            username: connection.username.clone(),
            password: connection.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Query-string parameters of a `/query` request
pub fn query_params<'a>(database: &'a str, statement: &'a str, precision: &'a str) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("q", statement)];
    if !database.is_empty() {
        params.push(("db", database));
    }
    if !precision.is_empty() {
        params.push(("epoch", precision));
    }
    params
}

/// Undo the transport encoding of a response body
pub fn decode_body(raw: Vec<u8>, content_encoding: Option<&str>) -> QueryResult<Vec<u8>> {
    match content_encoding {
        Some(encoding) if encoding.eq_ignore_ascii_case("gzip") => {
            let mut decoded = Vec::with_capacity(raw.len() * 4);
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| QueryError::Transport(format!("unable to decode gzip body: {}", e)))?;
            Ok(decoded)
        }
        _ => Ok(raw),
    }
}

/// Turn a raw response into its body, or into a remote error for a non-2xx status.
///
/// An error body that fails to decompress is reported as is, so the status survives.
pub fn response_body(status: u16, raw: Vec<u8>, content_encoding: Option<&str>) -> QueryResult<Vec<u8>> {
    if (200..300).contains(&status) {
        return decode_body(raw, content_encoding);
    }
    let body = match decode_body(raw.clone(), content_encoding) {
        Ok(decoded) => decoded,
        Err(_) => raw,
    };
    Err(remote_error(status, &body))
}

/// Build the error for a non-2xx response, preferring the server's own message
pub fn remote_error(status: u16, body: &[u8]) -> QueryError {
    let message = Response::from_bytes(body)
        .ok()
        .and_then(|rsp| rsp.error_message().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    QueryError::Remote { status, message }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn query(
        &self,
        method: Method,
        database: &str,
        statement: &str,
        precision: &str,
    ) -> QueryResult<Vec<u8>> {
        let statement = statement.trim();
        debug!("Query on '{}': {}", database, statement);

        let url = format!("{}/query", self.base_url);
        let mut request = self
            .client
            .request(method, &url)
            .query(&query_params(database, statement, precision))
            .header(ACCEPT_ENCODING, "gzip");
        if !self.username.is_empty() || !self.password.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().await.map_err(|e| {
            error!("query error: {}, the query is {}", e, statement);
            QueryError::from(e)
        })?;

        let status = response.status();
        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let raw = response.bytes().await.map_err(|e| {
            error!("read body error: {}, the query is {}", e, statement);
            QueryError::from(e)
        })?;
        response_body(status.as_u16(), raw.to_vec(), content_encoding.as_deref()).map_err(|e| {
            error!("{}, the query is {}", e, statement);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_query_params_skip_empty_values() {
        assert_eq!(query_params("", "show databases", ""), vec![("q", "show databases")]);
        assert_eq!(
            query_params("telegraf", "select * from \"cpu\"", "ns"),
            vec![("q", "select * from \"cpu\""), ("db", "telegraf"), ("epoch", "ns")]
        );
    }

    #[test]
    fn test_decode_gzip_body() {
        let payload = br#"{"results":[{"statement_id":0}]}"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decode_body(compressed, Some("gzip")).unwrap(), payload.to_vec());
        assert_eq!(decode_body(payload.to_vec(), None).unwrap(), payload.to_vec());
        assert!(matches!(
            decode_body(b"not gzip".to_vec(), Some("gzip")),
            Err(QueryError::Transport(_))
        ));
    }

    #[test]
    fn test_remote_error_carries_server_message() {
        let err = remote_error(401, br#"{"error":"authorization failed"}"#);
        assert_eq!(
            err,
            QueryError::Remote {
                status: 401,
                message: "authorization failed".to_string()
            }
        );

        let err = remote_error(502, b"Bad Gateway\n");
        assert_eq!(
            err,
            QueryError::Remote {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_status_is_checked_before_decoding() {
        let err = response_body(503, b"\x1f\x8bnot really gzip".to_vec(), Some("gzip")).unwrap_err();
        assert!(matches!(err, QueryError::Remote { status: 503, .. }));

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"error":"shard is busy"}"#).unwrap();
        let err = response_body(500, encoder.finish().unwrap(), Some("gzip")).unwrap_err();
        assert_eq!(
            err,
            QueryError::Remote {
                status: 500,
                message: "shard is busy".to_string()
            }
        );

        assert!(matches!(
            response_body(200, b"not gzip".to_vec(), Some("gzip")),
            Err(QueryError::Transport(_))
        ));
        assert_eq!(response_body(204, b"{}".to_vec(), None).unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_client_base_url() {
        let mut connection = ConnectionConfig::default();
        let client = HttpQueryClient::new(&connection).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8086");

        connection.ssl = true;
        connection.host = "influx.local".to_string();
        let client = HttpQueryClient::new(&connection).unwrap();
        assert_eq!(client.base_url(), "https://influx.local:8086");
    }
}
