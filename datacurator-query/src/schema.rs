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

//! Lazily fetched source schemas
//!
//! A source's schema is introspected once, rendered as compact SDL and
//! stored on its registry entry. Later calls return the stored text.

use crate::adapter::SourceAdapter;
use crate::error::{EngineError, EngineResult};
use datacurator_storage::SourceRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Object types with fields, four levels of type wrapping
pub const INTROSPECTION_QUERY: &str = "query IntrospectionQuery { __schema { queryType { name } types { kind name fields { name type { kind name ofType { kind name ofType { kind name ofType { kind name } } } } } } } }";

pub struct SchemaCache {
    registry: Arc<SourceRegistry>,
    adapter: Arc<dyn SourceAdapter>,
    timeout: Duration,
}

impl SchemaCache {
    pub fn new(
        registry: Arc<SourceRegistry>,
        adapter: Arc<dyn SourceAdapter>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            adapter,
            timeout,
        }
    }

    /// Cached schema text, introspecting the source on first use
    pub async fn ensure_schema(&self, source_id: &str) -> EngineResult<String> {
        let source = self
            .registry
            .get(source_id)
            .ok_or_else(|| EngineError::NotFound(format!("source {}", source_id)))?;

        match source.schema {
            Some(schema) if !schema.trim().is_empty() => Ok(schema),
            _ => self.refresh_schema(source_id).await,
        }
    }

    /// Re-introspect and overwrite the stored schema
    pub async fn refresh_schema(&self, source_id: &str) -> EngineResult<String> {
        let source = self
            .registry
            .get(source_id)
            .ok_or_else(|| EngineError::NotFound(format!("source {}", source_id)))?;

        let unavailable = |reason: String| EngineError::SchemaUnavailable {
            source_id: source_id.to_string(),
            reason,
        };

        let response = self
            .adapter
            .post_raw(&source.url, INTROSPECTION_QUERY, self.timeout)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let schema = response
            .pointer("/data/__schema")
            .ok_or_else(|| unavailable("response has no data.__schema".to_string()))?;

        let sdl = render_sdl(schema);
        if sdl.is_empty() {
            return Err(unavailable("schema has no object types".to_string()));
        }

        self.registry.set_schema(source_id, sdl.clone())?;
        tracing::info!(source_id, bytes = sdl.len(), "Schema cached");

        Ok(sdl)
    }
}

/// Render `__schema.types` object types as SDL, skipping meta types
pub fn render_sdl(schema: &Value) -> String {
    let Some(types) = schema.get("types").and_then(Value::as_array) else {
        return String::new();
    };

    types
        .iter()
        .filter(|t| t.get("kind").and_then(Value::as_str) == Some("OBJECT"))
        .filter_map(|t| {
            let name = t.get("name").and_then(Value::as_str)?;
            if name.starts_with("__") {
                return None;
            }
            let fields: Vec<String> = t
                .get("fields")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|f| {
                    let field = f.get("name").and_then(Value::as_str)?;
                    let ty = type_ref(f.get("type")?)?;
                    Some(format!("  {}: {}", field, ty))
                })
                .collect();
            if fields.is_empty() {
                return None;
            }
            Some(format!("type {} {{\n{}\n}}", name, fields.join("\n")))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn type_ref(ty: &Value) -> Option<String> {
    match ty.get("kind").and_then(Value::as_str)? {
        "NON_NULL" => Some(format!("{}!", type_ref(ty.get("ofType")?)?)),
        "LIST" => Some(format!("[{}]", type_ref(ty.get("ofType")?)?)),
        _ => ty.get("name").and_then(Value::as_str).map(str::to_string),
    }
}
