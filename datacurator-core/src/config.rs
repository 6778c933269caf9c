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

//! Engine configuration
//!
//! Loaded from an optional TOML file; environment variables that are
//! explicitly set override file values, and CLI flags override both.
//!
//! ```toml
//! [execution]
//! fetch_timeout_secs = 10
//!
//! [ranking]
//! similarity_threshold = 0.8
//! top_k = 4
//!
//! [embedding]
//! model = "text-embedding-004"
//!
//! [storage]
//! data_dir = "./datacurator-data"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "DATACURATOR_DATA_DIR";
pub const ENV_FETCH_TIMEOUT: &str = "DATACURATOR_FETCH_TIMEOUT_SECS";
pub const ENV_EMBEDDING_MODEL: &str = "DATACURATOR_EMBEDDING_MODEL";
pub const ENV_EMBEDDING_BASE_URL: &str = "DATACURATOR_EMBEDDING_BASE_URL";
pub const ENV_EMBEDDING_API_KEY: &str = "GOOGLE_AI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CuratorConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-source fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl ExecutionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Hybrid ranking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Candidates must have similarity strictly above this
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Semantic stage keeps at most this many candidates
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Number of ranked sources returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Lexical score assigned when the name contains the query text
    #[serde(default = "default_lexical_match_score")]
    pub lexical_match_score: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_candidates: default_max_candidates(),
            top_k: default_top_k(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            lexical_match_score: default_lexical_match_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Required for remote embedding; never written back to disk
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Query embedding cache capacity
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: u64,

    #[serde(default = "default_query_cache_ttl")]
    pub query_cache_ttl_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
            timeout_secs: default_embedding_timeout(),
            query_cache_size: default_query_cache_size(),
            query_cache_ttl_secs: default_query_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// Default values
fn default_fetch_timeout() -> u64 {
    10
}

fn default_similarity_threshold() -> f32 {
    0.8
}

fn default_max_candidates() -> usize {
    100
}

fn default_top_k() -> usize {
    4
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_lexical_weight() -> f32 {
    0.3
}

fn default_lexical_match_score() -> f32 {
    0.8
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_embedding_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_query_cache_size() -> u64 {
    1000
}

fn default_query_cache_ttl() -> u64 {
    300
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./datacurator-data")
}

impl CuratorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load the file if given and present, then apply environment overrides
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        Ok(config.merge_with_env(|key| std::env::var(key).ok()))
    }

    /// Override values whose variable is set; `lookup` abstracts the environment
    pub fn merge_with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(timeout) = lookup(ENV_FETCH_TIMEOUT) {
            match timeout.parse() {
                Ok(secs) => self.execution.fetch_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid {}: {:?}", ENV_FETCH_TIMEOUT, timeout),
            }
        }

        if let Some(model) = lookup(ENV_EMBEDDING_MODEL) {
            self.embedding.model = model;
        }

        if let Some(base_url) = lookup(ENV_EMBEDDING_BASE_URL) {
            self.embedding.base_url = base_url;
        }

        if let Some(key) = lookup(ENV_EMBEDDING_API_KEY) {
            if !key.trim().is_empty() {
                self.embedding.api_key = Some(key);
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CuratorConfig::default();
        assert_eq!(config.execution.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.ranking.similarity_threshold, 0.8);
        assert_eq!(config.ranking.max_candidates, 100);
        assert_eq!(config.ranking.top_k, 4);
        assert_eq!(config.ranking.semantic_weight, 0.7);
        assert_eq!(config.ranking.lexical_weight, 0.3);
        assert_eq!(config.ranking.lexical_match_score, 0.8);
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert!(config.embedding.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CuratorConfig::from_toml(
            r#"
            [execution]
            fetch_timeout_secs = 3

            [ranking]
            top_k = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.execution.fetch_timeout_secs, 3);
        assert_eq!(config.ranking.top_k, 2);
        assert_eq!(config.ranking.max_candidates, 100);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            CuratorConfig::from_toml("[execution]\nfetch_timeout_secs = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/curator"),
            (ENV_FETCH_TIMEOUT, "not-a-number"),
            (ENV_EMBEDDING_API_KEY, "secret"),
        ]
        .into_iter()
        .collect();

        let config = CuratorConfig::default()
            .merge_with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/curator"));
        assert_eq!(config.execution.fetch_timeout_secs, 10);
        assert_eq!(config.embedding.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curator.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/var/lib/curator\"\n").unwrap();

        let config = CuratorConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/curator"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = CuratorConfig::default();
        config.embedding.api_key = Some("secret".into());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("secret"));
    }
}
