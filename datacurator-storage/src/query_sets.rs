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

//! Stored query set table
//!
//! Sets are write-once: ids are generated on creation and an insert under an
//! id that is already present is rejected.

use crate::error::{StorageError, StorageResult};
use crate::table::TableFile;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use datacurator_core::{QuerySetId, Requirements, SourceQuerySpec, StoredQuerySet};
use std::path::Path;

const QUERY_SETS_TABLE: &str = "query_sets.json";

#[derive(Debug)]
pub struct QuerySetStore {
    sets: DashMap<QuerySetId, StoredQuerySet>,
    table: Option<TableFile>,
}

impl QuerySetStore {
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let table = TableFile::new(dir.as_ref(), QUERY_SETS_TABLE)?;
        let sets = DashMap::new();
        for set in table.load::<StoredQuerySet>()? {
            sets.insert(set.id.clone(), set);
        }
        tracing::info!(count = sets.len(), path = ?table.path(), "Query set store loaded");

        Ok(Self {
            sets,
            table: Some(table),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            sets: DashMap::new(),
            table: None,
        }
    }

    /// Create and persist a new query set with a generated id
    pub fn create(
        &self,
        source_queries: Vec<SourceQuerySpec>,
        requirements: Requirements,
        path: Option<String>,
    ) -> StorageResult<StoredQuerySet> {
        let mut set = StoredQuerySet::new(source_queries, requirements);
        set.path = path;
        self.insert(set.clone())?;
        tracing::info!(id = %set.id, sources = set.source_queries.len(), "Query set stored");
        Ok(set)
    }

    /// Add a set under a fresh id; an existing set is never replaced
    pub fn insert(&self, set: StoredQuerySet) -> StorageResult<()> {
        let id = set.id.clone();
        match self.sets.entry(id.clone()) {
            Entry::Occupied(_) => return Err(StorageError::QuerySetExists(id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(set);
            }
        }

        if let Err(e) = self.persist() {
            self.sets.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, id: &QuerySetId) -> Option<StoredQuerySet> {
        self.sets.get(id).map(|entry| entry.value().clone())
    }

    /// All sets, oldest first
    pub fn list(&self) -> Vec<StoredQuerySet> {
        let mut all: Vec<StoredQuerySet> =
            self.sets.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn remove(&self, id: &QuerySetId) -> StorageResult<bool> {
        let removed = self.sets.remove(id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn persist(&self) -> StorageResult<()> {
        match &self.table {
            Some(table) => table.write_with(|| {
                let mut all: Vec<StoredQuerySet> =
                    self.sets.iter().map(|entry| entry.value().clone()).collect();
                all.sort_by(|a, b| a.id.cmp(&b.id));
                all
            }),
            None => Ok(()),
        }
    }
}
