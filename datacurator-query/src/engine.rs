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

//! Engine facade
//!
//! [`CuratorEngine`] wires the registry, query-set store, embedding provider
//! and source adapter together and exposes the operations callers use:
//! rank sources for a request, store a query set, execute it.

use crate::adapter::{HttpSourceAdapter, SourceAdapter};
use crate::error::{EngineError, EngineResult};
use crate::executor::{ExecutionCoordinator, ExecutionResult, TimingMillis};
use crate::merge::merge;
use crate::schema::SchemaCache;
use crate::transform::TransformRegistry;
use datacurator_core::{
    CuratorConfig, QuerySetId, Requirements, Row, SourceQuerySpec, StoredQuerySet,
};
use datacurator_index::{
    CachedEmbedder, EmbeddingProvider, GoogleEmbeddingClient, RankedSource, SimilarityRanker,
};
use datacurator_storage::{CuratorStore, QuerySetStore, SourceRegistry};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Unified rows plus execution diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub data: Vec<Row>,
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionMetadata {
    pub total_subgraphs: usize,
    pub successful_subgraphs: usize,
    pub execution_time_ms: u64,
    pub errors: Vec<SourceErrorEntry>,
    pub timings: Vec<SourceTimingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceErrorEntry {
    #[serde(rename = "subgraphId")]
    pub source_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTimingEntry {
    #[serde(rename = "subgraphId")]
    pub source_id: String,
    pub succeeded: bool,
    pub rows: usize,
    #[serde(flatten)]
    pub timing: TimingMillis,
}

impl ExecutionMetadata {
    fn from_results(results: &[ExecutionResult], execution_time_ms: u64) -> Self {
        let errors = results
            .iter()
            .filter_map(|r| {
                r.error().map(|e| SourceErrorEntry {
                    source_id: r.source_id.clone(),
                    error: e.to_string(),
                })
            })
            .collect();

        let timings = results
            .iter()
            .map(|r| SourceTimingEntry {
                source_id: r.source_id.clone(),
                succeeded: r.is_success(),
                rows: r.rows().len(),
                timing: r.timing.millis(),
            })
            .collect();

        Self {
            total_subgraphs: results.len(),
            successful_subgraphs: results.iter().filter(|r| r.is_success()).count(),
            execution_time_ms,
            errors,
            timings,
        }
    }
}

pub struct CuratorEngine {
    store: CuratorStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    coordinator: ExecutionCoordinator,
    schemas: SchemaCache,
    config: CuratorConfig,
}

impl CuratorEngine {
    pub fn new(store: CuratorStore, adapter: Arc<dyn SourceAdapter>, config: CuratorConfig) -> Self {
        let transforms = Arc::new(TransformRegistry::builtin());
        let coordinator = ExecutionCoordinator::new(
            adapter.clone(),
            store.sources.clone(),
            transforms,
            &config.execution,
        );
        let schemas = SchemaCache::new(
            store.sources.clone(),
            adapter,
            config.execution.fetch_timeout(),
        );

        Self {
            store,
            embedder: None,
            coordinator,
            schemas,
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Open the on-disk store and HTTP clients described by `config`
    ///
    /// Without an embedding API key the engine still executes query sets;
    /// ranking and backfill report a configuration error.
    pub fn from_config(config: CuratorConfig) -> EngineResult<Self> {
        let store = CuratorStore::open(&config.storage.data_dir)?;
        let embedder: Option<Arc<dyn EmbeddingProvider>> =
            match GoogleEmbeddingClient::from_config(&config.embedding) {
                Ok(client) => {
                    let cached = CachedEmbedder::from_config(Arc::new(client), &config.embedding);
                    Some(Arc::new(cached) as Arc<dyn EmbeddingProvider>)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Embedding provider not configured");
                    None
                }
            };

        tracing::info!(
            data_dir = %config.storage.data_dir.display(),
            sources = store.sources.len(),
            query_sets = store.query_sets.len(),
            embeddings = embedder.is_some(),
            "Engine opened"
        );

        let engine = Self::new(store, Arc::new(HttpSourceAdapter::new()), config);
        Ok(match embedder {
            Some(embedder) => engine.with_embedder(embedder),
            None => engine,
        })
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.store.sources
    }

    pub fn query_sets(&self) -> &Arc<QuerySetStore> {
        &self.store.query_sets
    }

    fn embedder(&self) -> EngineResult<Arc<dyn EmbeddingProvider>> {
        self.embedder.clone().ok_or_else(|| {
            EngineError::Configuration(
                "no embedding provider configured (set GOOGLE_AI_API_KEY)".to_string(),
            )
        })
    }

    /// Best matching sources for a request, each with its schema filled in
    pub async fn rank_sources(&self, query_text: &str) -> EngineResult<Vec<RankedSource>> {
        let ranker = SimilarityRanker::with_config(
            self.embedder()?,
            self.store.sources.clone(),
            self.config.ranking.clone(),
        );
        let mut ranked = ranker.rank(query_text).await?;

        let fills = ranked
            .iter_mut()
            .filter(|r| !r.source.has_schema())
            .map(|r| async move {
                let schema = self.schemas.ensure_schema(&r.source.id).await?;
                r.source.schema = Some(schema);
                Ok::<_, EngineError>(())
            });
        try_join_all(fills).await?;

        Ok(ranked)
    }

    pub async fn ensure_schema(&self, source_id: &str) -> EngineResult<String> {
        self.schemas.ensure_schema(source_id).await
    }

    pub async fn refresh_schema(&self, source_id: &str) -> EngineResult<String> {
        self.schemas.refresh_schema(source_id).await
    }

    pub fn store_query_set(
        &self,
        source_queries: Vec<SourceQuerySpec>,
        requirements: Requirements,
    ) -> EngineResult<StoredQuerySet> {
        Ok(self.store.query_sets.create(source_queries, requirements, None)?)
    }

    /// Store under a caller-supplied label
    pub fn store_query_set_at(
        &self,
        path: impl Into<String>,
        source_queries: Vec<SourceQuerySpec>,
        requirements: Requirements,
    ) -> EngineResult<StoredQuerySet> {
        Ok(self
            .store
            .query_sets
            .create(source_queries, requirements, Some(path.into()))?)
    }

    pub async fn execute_stored_query_set(&self, id: &QuerySetId) -> EngineResult<QueryResponse> {
        let set = self
            .store
            .query_sets
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("query set {}", id)))?;

        Ok(self.execute(&set.source_queries, &set.requirements).await)
    }

    /// Execute without persisting anything
    pub async fn execute(
        &self,
        source_queries: &[SourceQuerySpec],
        requirements: &Requirements,
    ) -> QueryResponse {
        let started = Instant::now();

        for spec in source_queries {
            let dups = spec.duplicate_aliases();
            if !dups.is_empty() {
                tracing::debug!(source_id = %spec.source_id, aliases = ?dups, "Duplicate aliases, last mapping wins");
            }
        }

        let results = self.coordinator.execute(source_queries).await;
        let data = merge(&results, requirements);
        let metadata =
            ExecutionMetadata::from_results(&results, started.elapsed().as_millis() as u64);

        tracing::info!(
            rows = data.len(),
            total = metadata.total_subgraphs,
            succeeded = metadata.successful_subgraphs,
            execution_time_ms = metadata.execution_time_ms,
            "Query set executed"
        );

        QueryResponse { data, metadata }
    }

    /// Embed every registered source that has no embedding yet
    pub async fn backfill_embeddings(&self) -> EngineResult<usize> {
        let embedder = self.embedder()?;
        let pending = self.store.sources.missing_embeddings();
        let mut embedded = Vec::with_capacity(pending.len());
        let mut failure = None;

        for source in pending {
            match embedder.embed(&source.embedding_text()).await {
                Ok(embedding) => embedded.push((source.id, embedding)),
                Err(e) => {
                    tracing::warn!(source_id = %source.id, error = %e, "Embedding failed, stopping backfill");
                    failure = Some(e);
                    break;
                }
            }
        }

        // Embeddings computed before a failure are kept
        let done = self.store.sources.set_embeddings(embedded)?;
        if let Some(e) = failure {
            return Err(e.into());
        }

        tracing::info!(embedded = done, model = embedder.model_name(), "Embedding backfill complete");
        Ok(done)
    }
}
