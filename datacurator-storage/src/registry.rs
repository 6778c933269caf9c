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

//! Source registry keyed by source id
//!
//! All mutations are idempotent upserts; concurrent duplicate writes resolve
//! as last-writer-wins. Cached embeddings and schemas survive re-registration
//! of the same id unless the new descriptor carries its own.
//!
//! A mutation whose table write fails is rolled back in memory before the
//! error is returned, so the registry never holds state the disk lacks.

use crate::error::{StorageError, StorageResult};
use crate::table::TableFile;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use datacurator_core::SourceDescriptor;
use std::path::Path;

const SOURCES_TABLE: &str = "sources.json";

/// Source id and the descriptor it held before a mutation (`None` if absent)
type Undo = (String, Option<SourceDescriptor>);

#[derive(Debug)]
pub struct SourceRegistry {
    sources: DashMap<String, SourceDescriptor>,
    table: Option<TableFile>,
}

impl SourceRegistry {
    /// Open (or create) a registry persisted under `dir`
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let table = TableFile::new(dir.as_ref(), SOURCES_TABLE)?;
        let sources = DashMap::new();
        for source in table.load::<SourceDescriptor>()? {
            sources.insert(source.id.clone(), source);
        }
        tracing::info!(count = sources.len(), path = ?table.path(), "Source registry loaded");

        Ok(Self {
            sources,
            table: Some(table),
        })
    }

    /// Registry without persistence, for tests and ephemeral runs
    pub fn in_memory() -> Self {
        Self {
            sources: DashMap::new(),
            table: None,
        }
    }

    pub fn upsert(&self, source: SourceDescriptor) -> StorageResult<()> {
        let id = source.id.clone();
        let previous = self.insert_merged(source);
        self.persist_or_restore(vec![(id, previous)])
    }

    /// Bulk registration; persists once at the end
    pub fn import<I>(&self, sources: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = SourceDescriptor>,
    {
        let mut undo = Vec::new();
        for source in sources {
            let id = source.id.clone();
            let previous = self.insert_merged(source);
            undo.push((id, previous));
        }
        let count = undo.len();
        self.persist_or_restore(undo)?;
        tracing::info!(count, "Sources imported");
        Ok(count)
    }

    /// Bulk registration from a JSON array of descriptors
    pub fn import_file(&self, path: impl AsRef<Path>) -> StorageResult<usize> {
        let content = std::fs::read_to_string(path)?;
        let sources: Vec<SourceDescriptor> = serde_json::from_str(&content)?;
        self.import(sources)
    }

    pub fn get(&self, id: &str) -> Option<SourceDescriptor> {
        self.sources.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// All sources, sorted by id
    pub fn list(&self) -> Vec<SourceDescriptor> {
        let mut all: Vec<SourceDescriptor> =
            self.sources.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Sources that still need an embedding
    pub fn missing_embeddings(&self) -> Vec<SourceDescriptor> {
        self.list()
            .into_iter()
            .filter(|s| s.embedding.is_none())
            .collect()
    }

    pub fn remove(&self, id: &str) -> StorageResult<bool> {
        match self.sources.remove(id) {
            Some((id, previous)) => {
                self.persist_or_restore(vec![(id, Some(previous))])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_schema(&self, id: &str, schema: String) -> StorageResult<()> {
        let previous = self.modify(id, |source| source.schema = Some(schema))?;
        self.persist_or_restore(vec![previous])
    }

    pub fn set_embedding(&self, id: &str, embedding: Vec<f32>) -> StorageResult<()> {
        let previous = self.modify(id, |source| source.embedding = Some(embedding))?;
        self.persist_or_restore(vec![previous])
    }

    /// Store many embeddings with a single table write
    ///
    /// Ids no longer in the registry are skipped. Returns how many were stored.
    pub fn set_embeddings<I>(&self, embeddings: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        let mut undo = Vec::new();
        for (id, embedding) in embeddings {
            match self.modify(&id, |source| source.embedding = Some(embedding)) {
                Ok(previous) => undo.push(previous),
                Err(StorageError::SourceNotFound(id)) => {
                    tracing::debug!(source_id = %id, "Embedding for removed source dropped");
                }
                Err(e) => return Err(e),
            }
        }

        let count = undo.len();
        if count > 0 {
            self.persist_or_restore(undo)?;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Entry lock makes the merge atomic with concurrent `set_*` calls.
    /// Returns the replaced descriptor, if any.
    fn insert_merged(&self, mut source: SourceDescriptor) -> Option<SourceDescriptor> {
        match self.sources.entry(source.id.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get();
                if source.embedding.is_none() {
                    source.embedding = existing.embedding.clone();
                }
                if !source.has_schema() && existing.has_schema() {
                    source.schema = existing.schema.clone();
                }
                Some(entry.insert(source))
            }
            Entry::Vacant(entry) => {
                entry.insert(source);
                None
            }
        }
    }

    /// Apply `update` in place, returning the prior descriptor for rollback
    fn modify<F>(&self, id: &str, update: F) -> StorageResult<Undo>
    where
        F: FnOnce(&mut SourceDescriptor),
    {
        let mut entry = self
            .sources
            .get_mut(id)
            .ok_or_else(|| StorageError::SourceNotFound(id.to_string()))?;
        let previous = entry.value().clone();
        update(entry.value_mut());
        Ok((id.to_string(), Some(previous)))
    }

    /// Write the table; on failure put back the entries in `undo` so memory
    /// matches what is on disk
    fn persist_or_restore(&self, undo: Vec<Undo>) -> StorageResult<()> {
        let Err(e) = self.persist() else {
            return Ok(());
        };

        tracing::warn!(error = %e, entries = undo.len(), "Registry write failed, changes rolled back");
        for (id, previous) in undo.into_iter().rev() {
            match previous {
                Some(source) => {
                    self.sources.insert(id, source);
                }
                None => {
                    self.sources.remove(&id);
                }
            }
        }
        Err(e)
    }

    fn persist(&self) -> StorageResult<()> {
        match &self.table {
            Some(table) => table.write_with(|| self.list()),
            None => Ok(()),
        }
    }
}
