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

//! Datacurator storage
//!
//! File-backed tables for the two shared resources of the engine: the source
//! registry and the stored query sets. Both live in memory (`DashMap`) and
//! are rewritten as a JSON snapshot after every mutation.
//!
//! ```text
//! <data_dir>/
//!   sources.json      SourceDescriptor[], sorted by id
//!   query_sets.json   StoredQuerySet[], sorted by id
//! ```

pub mod error;
pub mod query_sets;
pub mod registry;
mod table;

pub use error::{StorageError, StorageResult};
pub use query_sets::QuerySetStore;
pub use registry::SourceRegistry;

use std::path::Path;
use std::sync::Arc;

/// Both tables opened from one data directory
#[derive(Debug, Clone)]
pub struct CuratorStore {
    pub sources: Arc<SourceRegistry>,
    pub query_sets: Arc<QuerySetStore>,
}

impl CuratorStore {
    pub fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = data_dir.as_ref();
        Ok(Self {
            sources: Arc::new(SourceRegistry::open(dir)?),
            query_sets: Arc::new(QuerySetStore::open(dir)?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            sources: Arc::new(SourceRegistry::in_memory()),
            query_sets: Arc::new(QuerySetStore::in_memory()),
        }
    }
}
