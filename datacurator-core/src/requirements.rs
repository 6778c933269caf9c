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

//! Requirements record produced by the request-understanding step
//!
//! The record arrives as camelCase JSON:
//!
//! ```json
//! {
//!   "protocols": ["compound", "aave"],
//!   "chains": ["arbitrum", "base"],
//!   "temporal": "hourly",
//!   "metrics": ["apy", "tvl"],
//!   "specialRequirements": {
//!     "needsComparison": true,
//!     "sortBy": "apy",
//!     "additionalFilters": ["tvl:min:1000000"]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Sort key meaning "keep concatenation order"
pub const SORT_NONE: &str = "none";

/// Structured data requirements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub temporal: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub special_requirements: SpecialRequirements,
}

/// Sorting, filtering and comparison directives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialRequirements {
    #[serde(default)]
    pub needs_comparison: bool,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default)]
    pub additional_filters: Vec<String>,
}

fn default_sort_by() -> String {
    SORT_NONE.to_string()
}

impl Default for SpecialRequirements {
    fn default() -> Self {
        Self {
            needs_comparison: false,
            sort_by: default_sort_by(),
            additional_filters: Vec::new(),
        }
    }
}

impl Requirements {
    pub fn sorted_by(mut self, field: impl Into<String>) -> Self {
        self.special_requirements.sort_by = field.into();
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.special_requirements.additional_filters.push(filter.into());
        self
    }

    /// Sort key, or `None` when results keep concatenation order
    pub fn sort_key(&self) -> Option<&str> {
        let key = self.special_requirements.sort_by.trim();
        if key.is_empty() || key.eq_ignore_ascii_case(SORT_NONE) {
            None
        } else {
            Some(key)
        }
    }

    pub fn filters(&self) -> &[String] {
        &self.special_requirements.additional_filters
    }

    /// Human-readable summary shown after a request is validated
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Tracking metrics: {}", self.metrics.join(", ")),
            format!("Update frequency: {}", self.temporal),
            format!("Chains covered: {}", self.chains.join(", ")),
            "Additional requirements:".to_string(),
        ];
        lines.extend(self.filters().iter().map(|f| format!("  - {}", f)));
        lines.push(format!("Sorting by: {}", self.special_requirements.sort_by));
        lines
    }
}

/// Name and description for an agent action that executes a stored query set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub name: String,
    pub description: String,
}

impl ActionMetadata {
    pub fn from_requirements(req: &Requirements) -> Self {
        let protocols = req.protocols.join(" and ");
        let metrics = req.metrics.join(", ");
        let chains = req.chains.join(", ");

        let protocol_slug = protocols
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        let first_metric = req
            .metrics
            .first()
            .map(|m| m.trim().to_lowercase())
            .unwrap_or_default();
        let name = format!("get_{}_{}_data", protocol_slug, first_metric);

        let mut description = format!("Fetch {} data for {} on {} chains", metrics, protocols, chains);
        if let Some(key) = req.sort_key() {
            description.push_str(&format!(" sorted by {}", key));
        }
        if !req.filters().is_empty() {
            description.push_str(&format!(" with filters: {}", req.filters().join(", ")));
        }

        Self { name, description }
    }
}
