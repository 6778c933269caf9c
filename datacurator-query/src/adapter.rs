// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Transport to external GraphQL sources
//!
//! Implementations only move bytes ([`SourceAdapter::send`]); the provided
//! methods own the timeout race, JSON decoding and response shape checks so
//! every adapter fails the same way.

use async_trait::async_trait;
use datacurator_core::FetchError;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Root entity list of one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPayload {
    /// Name of the first array field under `data`
    pub root_field: String,
    pub items: Vec<Value>,
    pub fetch: Duration,
    pub parse: Duration,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// POST a GraphQL document and return the raw response body
    async fn send(&self, endpoint: &str, document: &str) -> Result<String, FetchError>;

    /// Send under a timeout and extract the root entity list
    async fn fetch(
        &self,
        endpoint: &str,
        document: &str,
        timeout: Duration,
    ) -> Result<FetchedPayload, FetchError> {
        let started = Instant::now();
        let body = send_with_timeout(self, endpoint, document, timeout).await?;
        let fetch = started.elapsed();

        let started = Instant::now();
        let value = parse_body(&body)?;
        let (root_field, items) = extract_root(value)?;
        let parse = started.elapsed();

        Ok(FetchedPayload {
            root_field,
            items,
            fetch,
            parse,
        })
    }

    /// Send under a timeout and return the decoded body as is
    async fn post_raw(
        &self,
        endpoint: &str,
        document: &str,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        let body = send_with_timeout(self, endpoint, document, timeout).await?;
        parse_body(&body)
    }
}

async fn send_with_timeout<A: SourceAdapter + ?Sized>(
    adapter: &A,
    endpoint: &str,
    document: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    match tokio::time::timeout(timeout, adapter.send(endpoint, document)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn parse_body(body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::malformed(format!("invalid JSON: {}", e)))
}

/// First array-valued field of `data`, in document order
pub fn extract_root(mut response: Value) -> Result<(String, Vec<Value>), FetchError> {
    let root = response
        .get_mut("data")
        .and_then(Value::as_object_mut)
        .and_then(|data| {
            let key = data
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone())?;
            match data.remove(&key) {
                Some(Value::Array(items)) => Some((key, items)),
                _ => None,
            }
        });

    root.ok_or_else(|| {
        let errors = graphql_errors(&response);
        if errors.is_empty() {
            FetchError::malformed("response has no array field under `data`")
        } else {
            FetchError::malformed(errors.join("; "))
        }
    })
}

fn graphql_errors(response: &Value) -> Vec<String> {
    response
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// reqwest-backed adapter
#[derive(Debug, Clone, Default)]
pub struct HttpSourceAdapter {
    client: reqwest::Client,
}

impl HttpSourceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for HttpSourceAdapter {
    async fn send(&self, endpoint: &str, document: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "query": document }))
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_extract_root_first_array() {
        let response = json!({
            "data": {
                "protocol": {"name": "aave"},
                "markets": [{"id": "1"}, {"id": "2"}],
                "tokens": [{"id": "t"}]
            }
        });
        let (root, items) = extract_root(response).unwrap();
        assert_eq!(root, "markets");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_extract_root_rejects_bad_shapes() {
        for response in [
            json!({}),
            json!({"data": null}),
            json!({"data": {"market": {"id": "1"}}}),
            json!([1, 2]),
        ] {
            assert!(matches!(
                extract_root(response),
                Err(FetchError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn test_extract_root_reports_graphql_errors() {
        let response = json!({
            "data": null,
            "errors": [{"message": "Type `Query` has no field `pools`"}]
        });
        match extract_root(response) {
            Err(FetchError::Malformed { message }) => assert!(message.contains("no field `pools`")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/subgraphs/aave")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"query": "{ markets { id } }"})))
            .with_status(200)
            .with_body(r#"{"data": {"markets": [{"id": "a"}, {"id": "b"}]}}"#)
            .create_async()
            .await;

        let adapter = HttpSourceAdapter::new();
        let endpoint = format!("{}/subgraphs/aave", server.url());
        let payload = adapter
            .fetch(&endpoint, "{ markets { id } }", TIMEOUT)
            .await
            .unwrap();

        assert_eq!(payload.root_field, "markets");
        assert_eq!(payload.items, vec![json!({"id": "a"}), json!({"id": "b"})]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_non_2xx_is_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("indexer unavailable")
            .create_async()
            .await;

        let err = HttpSourceAdapter::new()
            .fetch(&server.url(), "{}", TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                body: "indexer unavailable".into()
            }
        );
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_http_invalid_json_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = HttpSourceAdapter::new()
            .fetch(&server.url(), "{}", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_http_connection_refused_is_network_error() {
        let err = HttpSourceAdapter::new()
            .fetch("http://127.0.0.1:1/graphql", "{}", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }

    struct StalledAdapter;

    #[async_trait]
    impl SourceAdapter for StalledAdapter {
        async fn send(&self, _endpoint: &str, _document: &str) -> Result<String, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses() {
        let err = StalledAdapter
            .fetch("http://unused", "{}", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout { timeout_ms: 250 });
    }

    #[tokio::test]
    async fn test_post_raw_skips_root_check() {
        struct Introspection;

        #[async_trait]
        impl SourceAdapter for Introspection {
            async fn send(&self, _: &str, _: &str) -> Result<String, FetchError> {
                Ok(r#"{"data": {"__schema": {"types": []}}}"#.to_string())
            }
        }

        let value = Introspection
            .post_raw("http://unused", "{ __schema { types { name } } }", TIMEOUT)
            .await
            .unwrap();
        assert!(value["data"]["__schema"].is_object());
    }
}
