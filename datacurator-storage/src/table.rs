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

//! JSON table files
//!
//! Each table is a single JSON array rewritten on every mutation. Writes go
//! to a sibling temp file first and are renamed into place, so readers never
//! observe a half-written table.

use crate::error::StorageResult;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub(crate) struct TableFile {
    path: PathBuf,
    /// Serializes snapshot writes so concurrent mutations never interleave on disk
    write_lock: Mutex<()>,
}

impl TableFile {
    pub(crate) fn new(dir: &Path, name: &str) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(name),
            write_lock: Mutex::new(()),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records; a missing file is an empty table
    pub(crate) fn load<T: DeserializeOwned>(&self) -> StorageResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Take the write lock, build the snapshot and replace the file
    pub(crate) fn write_with<T, F>(&self, snapshot: F) -> StorageResult<()>
    where
        T: Serialize,
        F: FnOnce() -> Vec<T>,
    {
        let _guard = self.write_lock.lock();
        let records = snapshot();
        let content = serde_json::to_string(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = ?self.path, records = records.len(), "Table persisted");
        Ok(())
    }
}
