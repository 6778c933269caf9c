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

//! Engine error types

use datacurator_index::{EmbeddingError, RankingError};
use datacurator_storage::StorageError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown query set or source id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing credentials or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Introspection failed or returned no usable schema
    #[error("Schema unavailable for {source_id}: {reason}")]
    SchemaUnavailable { source_id: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<EmbeddingError> for EngineError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::Configuration(msg) => EngineError::Configuration(msg),
            other => EngineError::Embedding(other),
        }
    }
}

impl From<RankingError> for EngineError {
    fn from(e: RankingError) -> Self {
        match e {
            RankingError::InvalidQuery(msg) => EngineError::InvalidQuery(msg),
            RankingError::Embedding(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_configuration_errors() {
        let err: EngineError =
            RankingError::Embedding(EmbeddingError::Configuration("no key".into())).into();
        assert!(matches!(err, EngineError::Configuration(_)));

        let err: EngineError = EmbeddingError::RateLimitExceeded.into();
        assert!(matches!(err, EngineError::Embedding(_)));
    }
}
