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

//! Index error types

use thiserror::Error;

/// Errors from embedding providers
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Missing credentials or invalid client settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from similarity ranking
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}
