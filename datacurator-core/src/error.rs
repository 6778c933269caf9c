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

//! Error types shared across the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one fetch against one external source
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Fetch did not complete within its timeout
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection, DNS or body read failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Endpoint answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response does not match the expected `{data: {<root>: [...]}}` shape
    #[error("Malformed response: {message}")]
    Malformed { message: String },

    /// Source id is not in the registry
    #[error("Source not registered: {source_id}")]
    UnknownSource { source_id: String },

    /// Fetch task panicked or was cancelled
    #[error("Task failed: {message}")]
    Task { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Connectivity failure as opposed to a schema/query mismatch
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::Status { .. }
        )
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
