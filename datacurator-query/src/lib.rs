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

//! Datacurator query engine
//!
//! Executes planned GraphQL queries against many external sources at once
//! and folds the answers into one table.
//!
//! ## Pipeline
//!
//! ```text
//! SourceQuerySpec[] ──► ExecutionCoordinator ──► ExecutionResult[] ──► merge ──► Row[]
//!                         │  (task per query)
//!                         ├─ SourceAdapter::fetch   (timeout, shape check)
//!                         └─ CompiledMappings::apply (path walk + transform)
//! ```
//!
//! [`CuratorEngine`] sits on top: it ranks sources, fills their schemas,
//! stores query sets and executes them by id.

pub mod adapter;
pub mod engine;
pub mod error;
pub mod executor;
pub mod merge;
pub mod schema;
pub mod transform;

pub use adapter::{FetchedPayload, HttpSourceAdapter, SourceAdapter};
pub use engine::{
    CuratorEngine, ExecutionMetadata, QueryResponse, SourceErrorEntry, SourceTimingEntry,
};
pub use error::{EngineError, EngineResult};
pub use executor::{
    timed, ExecutionCoordinator, ExecutionResult, Outcome, SourceTiming, TimingMillis,
};
pub use merge::{merge, merge_rows, FilterOp, RowFilter};
pub use schema::SchemaCache;
pub use transform::{apply, resolve_path, CompiledMappings, Transform, TransformRegistry};
