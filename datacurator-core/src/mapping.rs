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

//! Declarative field mappings and per-source query plans

use serde::{Deserialize, Serialize};

/// One unified output record: alias → scalar value, in mapping order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Maps a dot-separated path in a source item to an output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dot-separated path into the source item (e.g. "token.symbol")
    pub field: String,

    /// Output column name
    pub alias: String,

    /// Optional transform name (e.g. "parseFloat")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
}

impl FieldMapping {
    pub fn new(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            alias: alias.into(),
            transformation: None,
        }
    }

    pub fn with_transform(mut self, name: impl Into<String>) -> Self {
        self.transformation = Some(name.into());
        self
    }
}

/// One planned fetch: a GraphQL document against one source plus its mappings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuerySpec {
    #[serde(rename = "subgraphId", alias = "sourceId", alias = "source_id")]
    pub source_id: String,

    /// Opaque GraphQL document
    pub query: String,

    #[serde(rename = "fieldMappings", alias = "mappings", default)]
    pub mappings: Vec<FieldMapping>,
}

impl SourceQuerySpec {
    pub fn new(source_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            query: query.into(),
            mappings: Vec::new(),
        }
    }

    pub fn mapping(mut self, mapping: FieldMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Aliases that appear more than once; later mappings overwrite earlier ones
    pub fn duplicate_aliases(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for m in &self.mappings {
            if !seen.insert(m.alias.as_str()) && !dups.contains(&m.alias.as_str()) {
                dups.push(m.alias.as_str());
            }
        }
        dups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_wire_names() {
        let json = r#"{
            "subgraphId": "aave-v3",
            "query": "{ markets { id } }",
            "fieldMappings": [
                {"field": "totalValueLockedUSD", "alias": "tvl", "transformation": "parseFloat"},
                {"field": "name", "alias": "name"}
            ]
        }"#;
        let spec: SourceQuerySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.source_id, "aave-v3");
        assert_eq!(spec.mappings.len(), 2);
        assert_eq!(spec.mappings[0].transformation.as_deref(), Some("parseFloat"));
        assert!(spec.mappings[1].transformation.is_none());
    }

    #[test]
    fn test_spec_accepts_alternate_names() {
        let json = r#"{"sourceId": "x", "query": "{}", "mappings": []}"#;
        let spec: SourceQuerySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.source_id, "x");
    }

    #[test]
    fn test_duplicate_aliases() {
        let spec = SourceQuerySpec::new("s", "{}")
            .mapping(FieldMapping::new("a", "x"))
            .mapping(FieldMapping::new("b", "x"))
            .mapping(FieldMapping::new("c", "x"))
            .mapping(FieldMapping::new("d", "y"));
        assert_eq!(spec.duplicate_aliases(), vec!["x"]);
    }
}
