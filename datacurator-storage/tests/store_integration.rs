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

//! Integration tests for the file-backed tables

use datacurator_core::{Requirements, SourceDescriptor, SourceQuerySpec};
use datacurator_storage::CuratorStore;
use std::sync::Arc;
use std::thread;

/// Concurrent duplicate upserts converge and the snapshot on disk is complete
#[test]
fn test_concurrent_upserts_persist_every_source() {
    let dir = tempfile::tempdir().unwrap();
    let store = CuratorStore::open(dir.path()).unwrap();
    let registry = Arc::clone(&store.sources);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..10 {
                    let id = format!("source-{}", i);
                    registry
                        .upsert(SourceDescriptor::new(
                            &id,
                            format!("Source {}", i),
                            format!("https://graph.example/{}", i),
                        ))
                        .unwrap();
                    if worker == 0 {
                        registry.set_schema(&id, format!("type T{} {{ id: ID! }}", i)).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 10);

    let reopened = CuratorStore::open(dir.path()).unwrap();
    assert_eq!(reopened.sources.len(), 10);
    // Schemas written by worker 0 survive later upserts without a schema
    assert!(reopened.sources.list().iter().all(|s| s.has_schema()));
}

#[test]
fn test_query_sets_and_sources_share_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = CuratorStore::open(dir.path()).unwrap();
        store
            .sources
            .upsert(SourceDescriptor::new("uni", "Uniswap V3", "https://u"))
            .unwrap();
        store
            .query_sets
            .create(
                vec![SourceQuerySpec::new("uni", "{ pools { id } }")],
                Requirements::default(),
                None,
            )
            .unwrap()
            .id
    };

    assert!(dir.path().join("sources.json").exists());
    assert!(dir.path().join("query_sets.json").exists());

    let store = CuratorStore::open(dir.path()).unwrap();
    assert!(store.sources.contains("uni"));
    assert_eq!(store.query_sets.get(&id).unwrap().source_queries.len(), 1);
}
