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

//! Datacurator source index
//!
//! Finds the external sources most relevant to a free-text request:
//! embeddings from a pluggable provider, an exact cosine scan over the
//! registry, and a hybrid semantic + lexical score.

pub mod embedding;
pub mod error;
pub mod ranking;
pub mod vector;

pub use embedding::{CachedEmbedder, EmbeddingProvider, GoogleEmbeddingClient};
pub use error::{EmbeddingError, RankingError};
pub use ranking::{blend, RankedSource, SimilarityRanker};
pub use vector::{cosine_similarity, FlatIndex};
