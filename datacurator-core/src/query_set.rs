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

//! Stored query sets: the unit of re-execution

use crate::mapping::SourceQuerySpec;
use crate::requirements::Requirements;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored query set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySetId(pub String);

impl QuerySetId {
    /// Generate a new unique ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QuerySetId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for QuerySetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuerySetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for QuerySetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted bundle of per-source queries, mappings and requirements
///
/// Immutable once created; executing it again may return different live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuerySet {
    pub id: QuerySetId,

    /// Optional caller-supplied label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(rename = "subgraph_queries", alias = "source_queries", default)]
    pub source_queries: Vec<SourceQuerySpec>,

    #[serde(default)]
    pub requirements: Requirements,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredQuerySet {
    pub fn new(source_queries: Vec<SourceQuerySpec>, requirements: Requirements) -> Self {
        let now = Utc::now();
        Self {
            id: QuerySetId::new(),
            path: None,
            source_queries,
            requirements,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
