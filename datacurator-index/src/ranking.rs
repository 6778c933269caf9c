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

//! Hybrid semantic + lexical ranking of sources
//!
//! ## Scoring
//!
//! 1. Semantic stage: cosine similarity between the query embedding and each
//!    source embedding; keep `similarity > similarity_threshold`, best
//!    `max_candidates`.
//! 2. Lexical stage, over the whole registry: `lexical_match_score` when the
//!    source name contains the query text (case-insensitive), else 0.
//! 3. `score = semantic * semantic_weight + lexical * lexical_weight`,
//!    sorted descending, best `top_k` returned.
//!
//! Only semantic candidates are blended, so a name match with no semantic
//! similarity never reaches the result.

use crate::embedding::EmbeddingProvider;
use crate::error::RankingError;
use crate::vector::FlatIndex;
use datacurator_core::{RankingConfig, SourceDescriptor};
use datacurator_storage::SourceRegistry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// A source with its ranking breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSource {
    pub source: SourceDescriptor,
    pub semantic_similarity: f32,
    pub lexical_score: f32,
    pub score: f32,
}

pub struct SimilarityRanker {
    provider: Arc<dyn EmbeddingProvider>,
    registry: Arc<SourceRegistry>,
    config: RankingConfig,
}

impl SimilarityRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, registry: Arc<SourceRegistry>) -> Self {
        Self::with_config(provider, registry, RankingConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn EmbeddingProvider>,
        registry: Arc<SourceRegistry>,
        config: RankingConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Embed the query and rank the registry against it
    pub async fn rank(&self, query_text: &str) -> Result<Vec<RankedSource>, RankingError> {
        if query_text.trim().is_empty() {
            return Err(RankingError::InvalidQuery("query text is empty".to_string()));
        }

        let embedding = self.provider.embed(query_text).await?;
        let ranked = self.rank_with_embedding(query_text, &embedding);

        tracing::info!(
            query = query_text,
            model = self.provider.model_name(),
            returned = ranked.len(),
            "Sources ranked"
        );

        Ok(ranked)
    }

    /// Rank with a precomputed query embedding
    pub fn rank_with_embedding(&self, query_text: &str, embedding: &[f32]) -> Vec<RankedSource> {
        let sources = self.registry.list();
        let index = FlatIndex::from_sources(&sources);

        let semantic = index.search(
            embedding,
            self.config.max_candidates,
            self.config.similarity_threshold,
        );
        let lexical = lexical_scores(&sources, query_text, self.config.lexical_match_score);

        tracing::debug!(
            indexed = index.len(),
            semantic_candidates = semantic.len(),
            lexical_matches = lexical.len(),
            "Ranking stages complete"
        );

        let by_id: HashMap<&str, &SourceDescriptor> =
            sources.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut ranked: Vec<RankedSource> = semantic
            .into_iter()
            .filter_map(|(id, similarity)| {
                let source = by_id.get(id.as_str())?;
                let lexical_score = lexical.get(id.as_str()).copied().unwrap_or(0.0);
                Some(RankedSource {
                    source: (*source).clone(),
                    semantic_similarity: similarity,
                    lexical_score,
                    score: blend(&self.config, similarity, lexical_score),
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(self.config.top_k);
        ranked
    }
}

/// Weighted blend of the two stages
pub fn blend(config: &RankingConfig, semantic: f32, lexical: f32) -> f32 {
    semantic * config.semantic_weight + lexical * config.lexical_weight
}

/// Name-contains-query scores for every matching source in the registry
fn lexical_scores<'a>(
    sources: &'a [SourceDescriptor],
    query_text: &str,
    match_score: f32,
) -> HashMap<&'a str, f32> {
    let needle = query_text.to_lowercase();
    sources
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .map(|s| (s.id.as_str(), match_score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_with_similarity(similarity: f32) -> Vec<f32> {
        vec![similarity, (1.0 - similarity * similarity).sqrt()]
    }

    #[test]
    fn test_blend_defaults() {
        let config = RankingConfig::default();
        assert!((blend(&config, 0.9, 0.8) - 0.87).abs() < 1e-6);
        assert!((blend(&config, 0.85, 0.0) - 0.595).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_scores_case_insensitive() {
        let sources = vec![
            SourceDescriptor::new("1", "Aave V3 Base", "u"),
            SourceDescriptor::new("2", "Compound", "u"),
        ];
        let scores = lexical_scores(&sources, "AAVE", 0.8);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get("1"), Some(&0.8));
    }

    #[test]
    fn test_lexical_only_match_is_excluded() {
        let registry = Arc::new(SourceRegistry::in_memory());
        registry
            .import(vec![
                SourceDescriptor::new("name-only", "Aave Lending", "u")
                    .embedding(vector_with_similarity(0.1)),
                SourceDescriptor::new("semantic", "Lending Markets", "u")
                    .embedding(vector_with_similarity(0.82)),
            ])
            .unwrap();

        let ranker = SimilarityRanker::new(Arc::new(NoopProvider), registry);
        let ranked = ranker.rank_with_embedding("aave", &[1.0, 0.0]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source.id, "semantic");
        assert_eq!(ranked[0].lexical_score, 0.0);
    }

    struct NoopProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for NoopProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, crate::EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "noop"
        }
    }
}
