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

//! Concurrent multi-source execution
//!
//! Every source query becomes its own task: resolve the endpoint, fetch under a
//! timeout, map the root items to rows. A failed query never affects the
//! others; its result simply carries the error and contributes no rows.
//! Results come back in plan order regardless of completion order.

use crate::adapter::SourceAdapter;
use crate::transform::{CompiledMappings, TransformRegistry};
use datacurator_core::{ExecutionConfig, FetchError, Row, SourceQuerySpec};
use datacurator_storage::SourceRegistry;
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-phase wall time of one source query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceTiming {
    pub fetch: Duration,
    pub parse: Duration,
    pub transform: Duration,
    pub total: Duration,
}

/// Millisecond view of [`SourceTiming`] for responses and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingMillis {
    pub fetch_ms: f64,
    pub parse_ms: f64,
    pub transform_ms: f64,
    pub total_ms: f64,
}

impl SourceTiming {
    pub fn millis(&self) -> TimingMillis {
        let ms = |d: Duration| d.as_micros() as f64 / 1000.0;
        TimingMillis {
            fetch_ms: ms(self.fetch),
            parse_ms: ms(self.parse),
            transform_ms: ms(self.transform),
            total_ms: ms(self.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { rows: Vec<Row> },
    Failed { error: FetchError },
}

/// Result of one source query; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub source_id: String,
    pub outcome: Outcome,
    pub timing: SourceTiming,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    pub fn rows(&self) -> &[Row] {
        match &self.outcome {
            Outcome::Succeeded { rows } => rows,
            Outcome::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            Outcome::Succeeded { .. } => None,
        }
    }

    fn failed(source_id: String, error: FetchError, timing: SourceTiming) -> Self {
        Self {
            source_id,
            outcome: Outcome::Failed { error },
            timing,
        }
    }
}

/// Await a future and report how long it took
pub async fn timed<F: Future>(future: F) -> (F::Output, Duration) {
    let started = Instant::now();
    let output = future.await;
    (output, started.elapsed())
}

/// Run a closure and report how long it took
pub fn timed_sync<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let started = Instant::now();
    let output = f();
    (output, started.elapsed())
}

/// Fans source queries out and collects one result per query
#[derive(Clone)]
pub struct ExecutionCoordinator {
    adapter: Arc<dyn SourceAdapter>,
    registry: Arc<SourceRegistry>,
    transforms: Arc<TransformRegistry>,
    fetch_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        registry: Arc<SourceRegistry>,
        transforms: Arc<TransformRegistry>,
        config: &ExecutionConfig,
    ) -> Self {
        Self {
            adapter,
            registry,
            transforms,
            fetch_timeout: config.fetch_timeout(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Execute all queries concurrently; output order matches `specs`
    pub async fn execute(&self, specs: &[SourceQuerySpec]) -> Vec<ExecutionResult> {
        tracing::info!(
            specs = specs.len(),
            timeout_ms = self.fetch_timeout.as_millis() as u64,
            "Executing source queries"
        );

        let handles: Vec<_> = specs
            .iter()
            .map(|spec| {
                let source_id = spec.source_id.clone();
                let endpoint = self.registry.get(&spec.source_id).map(|s| s.url);
                let document = spec.query.clone();
                let mappings = self.transforms.compile(&spec.mappings);
                let adapter = Arc::clone(&self.adapter);
                let timeout = self.fetch_timeout;

                tokio::spawn(async move {
                    run_spec(adapter, source_id, endpoint, document, mappings, timeout).await
                })
            })
            .collect();

        let results: Vec<ExecutionResult> = join_all(handles)
            .await
            .into_iter()
            .zip(specs)
            .map(|(joined, spec)| {
                joined.unwrap_or_else(|e| {
                    tracing::warn!(source_id = %spec.source_id, error = %e, "Fetch task failed");
                    ExecutionResult::failed(
                        spec.source_id.clone(),
                        FetchError::Task {
                            message: e.to_string(),
                        },
                        SourceTiming::default(),
                    )
                })
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Source queries complete"
        );

        results
    }
}

async fn run_spec(
    adapter: Arc<dyn SourceAdapter>,
    source_id: String,
    endpoint: Option<String>,
    document: String,
    mappings: CompiledMappings,
    timeout: Duration,
) -> ExecutionResult {
    let Some(endpoint) = endpoint else {
        tracing::warn!(source_id = %source_id, "Source not registered");
        let error = FetchError::UnknownSource {
            source_id: source_id.clone(),
        };
        return ExecutionResult::failed(source_id, error, SourceTiming::default());
    };

    tracing::debug!(source_id = %source_id, endpoint = %endpoint, "Fetching");

    let (fetched, total) = timed(adapter.fetch(&endpoint, &document, timeout)).await;

    let payload = match fetched {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(
                source_id = %source_id,
                error = %error,
                elapsed_ms = total.as_millis() as u64,
                "Source fetch failed"
            );
            let timing = SourceTiming {
                total,
                ..Default::default()
            };
            return ExecutionResult::failed(source_id, error, timing);
        }
    };

    let (rows, transform) = timed_sync(|| {
        payload
            .items
            .iter()
            .map(|item| mappings.apply(item))
            .collect::<Vec<_>>()
    });

    let timing = SourceTiming {
        fetch: payload.fetch,
        parse: payload.parse,
        transform,
        total: total + transform,
    };

    tracing::debug!(
        source_id = %source_id,
        root = %payload.root_field,
        rows = rows.len(),
        fetch_ms = timing.fetch.as_millis() as u64,
        parse_ms = timing.parse.as_millis() as u64,
        transform_ms = timing.transform.as_millis() as u64,
        total_ms = timing.total.as_millis() as u64,
        "Source query succeeded"
    );

    ExecutionResult {
        source_id,
        outcome: Outcome::Succeeded { rows },
        timing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use datacurator_core::{FieldMapping, SourceDescriptor};
    use serde_json::json;
    use std::collections::HashMap;

    /// Serves canned bodies per endpoint after a fixed delay
    struct ScriptedAdapter {
        routes: HashMap<String, (Duration, Result<String, FetchError>)>,
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        async fn send(&self, endpoint: &str, _document: &str) -> Result<String, FetchError> {
            let (delay, response) = self
                .routes
                .get(endpoint)
                .cloned()
                .unwrap_or((Duration::ZERO, Err(FetchError::network("no route"))));
            tokio::time::sleep(delay).await;
            response
        }
    }

    fn markets(names: &[&str]) -> String {
        let items: Vec<_> = names.iter().map(|n| json!({"name": n})).collect();
        json!({"data": {"markets": items}}).to_string()
    }

    fn coordinator(
        routes: Vec<(&str, Duration, Result<String, FetchError>)>,
    ) -> ExecutionCoordinator {
        let registry = Arc::new(SourceRegistry::in_memory());
        let mut table = HashMap::new();
        for (id, delay, response) in routes {
            let url = format!("http://{}.test/graphql", id);
            registry
                .upsert(SourceDescriptor::new(id, id, url.clone()))
                .unwrap();
            table.insert(url, (delay, response));
        }

        ExecutionCoordinator::new(
            Arc::new(ScriptedAdapter { routes: table }),
            registry,
            Arc::new(TransformRegistry::builtin()),
            &ExecutionConfig::default(),
        )
    }

    fn spec(id: &str) -> SourceQuerySpec {
        SourceQuerySpec::new(id, "{ markets { name } }").mapping(FieldMapping::new("name", "market"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_timeout_two_successes() {
        let coordinator = coordinator(vec![
            ("fast", Duration::from_millis(100), Ok(markets(&["a", "b"]))),
            ("stalled", Duration::from_secs(30), Ok(markets(&["never"]))),
            ("slow", Duration::from_secs(9), Ok(markets(&["c"]))),
        ]);

        let results = coordinator
            .execute(&[spec("fast"), spec("stalled"), spec("slow")])
            .await;

        let ids: Vec<&str> = results.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "stalled", "slow"]);

        assert_eq!(results[0].rows().len(), 2);
        assert_eq!(
            results[1].error(),
            Some(&FetchError::Timeout { timeout_ms: 10_000 })
        );
        assert!(results[1].rows().is_empty());
        assert_eq!(results[2].rows()[0]["market"], json!("c"));
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_specs_run_concurrently() {
        let coordinator = coordinator(vec![
            ("a", Duration::from_secs(5), Ok(markets(&["a"]))),
            ("b", Duration::from_secs(5), Ok(markets(&["b"]))),
            ("c", Duration::from_secs(5), Ok(markets(&["c"]))),
        ]);

        let started = tokio::time::Instant::now();
        let results = coordinator.execute(&[spec("a"), spec("b"), spec("c")]).await;

        assert!(results.iter().all(|r| r.is_success()));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unknown_source_and_transport_failures_are_contained() {
        let coordinator = coordinator(vec![
            ("ok", Duration::ZERO, Ok(markets(&["x"]))),
            (
                "down",
                Duration::ZERO,
                Err(FetchError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                }),
            ),
            ("weird", Duration::ZERO, Ok(r#"{"data": {"count": 3}}"#.into())),
        ]);

        let results = coordinator
            .execute(&[spec("ok"), spec("down"), spec("ghost"), spec("weird")])
            .await;

        assert!(results[0].is_success());
        assert!(matches!(
            results[1].error(),
            Some(FetchError::Status { status: 502, .. })
        ));
        assert_eq!(
            results[2].error(),
            Some(&FetchError::UnknownSource {
                source_id: "ghost".into()
            })
        );
        assert!(matches!(
            results[3].error(),
            Some(FetchError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_specs() {
        let coordinator = coordinator(vec![]);
        assert!(coordinator.execute(&[]).await.is_empty());
    }

    #[test]
    fn test_timing_millis() {
        let timing = SourceTiming {
            fetch: Duration::from_millis(120),
            parse: Duration::from_millis(3),
            transform: Duration::from_micros(500),
            total: Duration::from_millis(124),
        };
        let ms = timing.millis();
        assert_eq!(ms.fetch_ms, 120.0);
        assert_eq!(ms.transform_ms, 0.5);
    }
}
