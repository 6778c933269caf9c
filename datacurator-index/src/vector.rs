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

//! Exact vector scan over source embeddings
//!
//! Registries hold at most a few thousand sources, so a flat scan gives the
//! same answer as an ANN index without the build cost.

use datacurator_core::SourceDescriptor;
use ndarray::ArrayView1;
use std::cmp::Ordering;

/// Compute cosine similarity between two vectors
///
/// Mismatched dimensions or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a < 1e-8 || norm_b < 1e-8 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Flat index of (source id, embedding)
#[derive(Debug, Default)]
pub struct FlatIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl FlatIndex {
    /// Index every source that already has an embedding
    pub fn from_sources(sources: &[SourceDescriptor]) -> Self {
        let entries = sources
            .iter()
            .filter_map(|s| s.embedding.as_ref().map(|e| (s.id.clone(), e.clone())))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` ids with similarity strictly above `min_similarity`, best first
    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<(String, f32)> {
        let mut skipped = 0usize;
        let mut hits: Vec<(String, f32)> = self
            .entries
            .iter()
            .filter_map(|(id, vector)| {
                if vector.len() != query.len() {
                    skipped += 1;
                    return None;
                }
                let similarity = cosine_similarity(query, vector);
                (similarity > min_similarity).then(|| (id.clone(), similarity))
            })
            .collect();

        if skipped > 0 {
            tracing::warn!(
                skipped,
                query_dim = query.len(),
                "Skipped embeddings with mismatched dimension"
            );
        }

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        hits
    }
}
