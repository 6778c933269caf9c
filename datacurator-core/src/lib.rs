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

//! Datacurator core types
//!
//! Data model shared by the registry, the ranker and the execution engine:
//! source descriptors, field mappings, per-source query plans, stored query
//! sets and the requirements record, plus configuration and fetch errors.

pub mod config;
pub mod error;
pub mod mapping;
pub mod query_set;
pub mod requirements;
pub mod source;

pub use config::{CuratorConfig, EmbeddingConfig, ExecutionConfig, RankingConfig, StorageConfig};
pub use error::{ConfigError, FetchError};
pub use mapping::{FieldMapping, Row, SourceQuerySpec};
pub use query_set::{QuerySetId, StoredQuerySet};
pub use requirements::{ActionMetadata, Requirements, SpecialRequirements, SORT_NONE};
pub use source::SourceDescriptor;
