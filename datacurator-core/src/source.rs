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

//! External data sources ("subgraphs")
//!
//! A [`SourceDescriptor`] identifies one GraphQL endpoint. The embedding and
//! the introspected schema are filled lazily and cached in the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity and cached metadata of one external GraphQL source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable identifier (registry key)
    pub id: String,

    /// Display name, also used for lexical matching
    pub name: String,

    /// GraphQL endpoint URL
    pub url: String,

    /// Protocol the source indexes (e.g. "aave")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Chain the source indexes (e.g. "arbitrum")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    /// Embedding of the source description, computed lazily
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Introspected schema rendered as SDL text, fetched lazily
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Popularity signal
    #[serde(default)]
    pub queries_per_day: u64,

    /// Curation/trust signal
    #[serde(default)]
    pub stake_amount: u64,

    /// Top-level query roots exposed by the source
    #[serde(default)]
    pub entities: BTreeSet<String>,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            protocol: None,
            chain: None,
            embedding: None,
            schema: None,
            queries_per_day: 0,
            stake_amount: 0,
            entities: BTreeSet::new(),
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    /// Text fed to the embedding provider when the source is indexed
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(protocol) = &self.protocol {
            parts.push(protocol);
        }
        if let Some(chain) = &self.chain {
            parts.push(chain);
        }
        parts.join(" ")
    }

    pub fn has_schema(&self) -> bool {
        self.schema.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
    }
}
