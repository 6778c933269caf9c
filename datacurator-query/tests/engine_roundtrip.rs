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

//! End-to-end tests: store a query set, execute it, reopen the store

use async_trait::async_trait;
use datacurator_core::{
    CuratorConfig, FetchError, FieldMapping, QuerySetId, Requirements, SourceDescriptor,
    SourceQuerySpec,
};
use datacurator_query::{CuratorEngine, EngineError, HttpSourceAdapter, SourceAdapter};
use datacurator_storage::CuratorStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Fixed responses per endpoint, optionally delayed
struct MockAdapter;

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn send(&self, endpoint: &str, _document: &str) -> Result<String, FetchError> {
        match endpoint {
            "http://compound.test" => Ok(json!({"data": {"markets": [
                {"name": "cUSDC", "supplyRate": "0.031", "tvl": "2500000"},
                {"name": "cETH", "supplyRate": "0.012", "tvl": "900000"}
            ]}})
            .to_string()),
            "http://aave.test" => Ok(json!({"data": {"reserves": [
                {"symbol": "USDC", "liquidityRate": 0.045, "totalLiquidityUSD": 4_000_000}
            ]}})
            .to_string()),
            "http://stalled.test" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
            other => Err(FetchError::network(format!("no route to {}", other))),
        }
    }
}

fn sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("compound-v3", "Compound V3", "http://compound.test")
            .protocol("compound")
            .chain("arbitrum"),
        SourceDescriptor::new("aave-v3", "Aave V3", "http://aave.test")
            .protocol("aave")
            .chain("arbitrum"),
        SourceDescriptor::new("stalled", "Stalled", "http://stalled.test"),
    ]
}

fn specs() -> Vec<SourceQuerySpec> {
    vec![
        SourceQuerySpec::new("compound-v3", "{ markets { name supplyRate tvl } }")
            .mapping(FieldMapping::new("name", "market"))
            .mapping(FieldMapping::new("supplyRate", "apy").with_transform("multiply100"))
            .mapping(FieldMapping::new("tvl", "tvl").with_transform("parseFloat")),
        SourceQuerySpec::new("aave-v3", "{ reserves { symbol liquidityRate totalLiquidityUSD } }")
            .mapping(FieldMapping::new("symbol", "market"))
            .mapping(FieldMapping::new("liquidityRate", "apy").with_transform("multiply100"))
            .mapping(FieldMapping::new("totalLiquidityUSD", "tvl")),
    ]
}

fn requirements() -> Requirements {
    Requirements {
        protocols: vec!["compound".into(), "aave".into()],
        chains: vec!["arbitrum".into()],
        metrics: vec!["apy".into()],
        ..Default::default()
    }
    .sorted_by("apy")
    .filter("tvl:min:1000000")
}

fn open_engine(dir: &TempDir) -> CuratorEngine {
    let store = CuratorStore::open(dir.path()).unwrap();
    CuratorEngine::new(store, Arc::new(MockAdapter), CuratorConfig::default())
}

#[tokio::test]
async fn test_repeated_execution_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    engine.registry().import(sources()).unwrap();

    let set = engine.store_query_set(specs(), requirements()).unwrap();

    let first = engine.execute_stored_query_set(&set.id).await.unwrap();
    let second = engine.execute_stored_query_set(&set.id).await.unwrap();
    assert_eq!(first.data, second.data);

    let markets: Vec<&str> = first
        .data
        .iter()
        .map(|r| r["market"].as_str().unwrap())
        .collect();
    assert_eq!(markets, vec!["USDC", "cUSDC"]);
    assert_eq!(first.metadata.total_subgraphs, 2);
    assert_eq!(first.metadata.successful_subgraphs, 2);
    assert!(first.metadata.errors.is_empty());
}

#[tokio::test]
async fn test_stored_set_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let engine = open_engine(&dir);
        engine.registry().import(sources()).unwrap();
        engine
            .store_query_set_at("defi/lending-apy", specs(), requirements())
            .unwrap()
            .id
    };

    let engine = open_engine(&dir);
    let set = engine.query_sets().get(&id).unwrap();
    assert_eq!(set.path.as_deref(), Some("defi/lending-apy"));
    assert_eq!(set.source_queries, specs());

    let response = engine.execute_stored_query_set(&id).await.unwrap();
    assert_eq!(response.data.len(), 2);
}

#[tokio::test]
async fn test_zero_spec_query_set() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let set = engine
        .store_query_set(Vec::new(), Requirements::default())
        .unwrap();

    let response = engine.execute_stored_query_set(&set.id).await.unwrap();
    assert!(response.data.is_empty());
    assert_eq!(response.metadata.total_subgraphs, 0);
    assert_eq!(response.metadata.successful_subgraphs, 0);
}

#[tokio::test]
async fn test_unknown_query_set_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let result = engine
        .execute_stored_query_set(&QuerySetId::from("00000000-0000-0000-0000-000000000000"))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_source_is_contained() {
    let engine = CuratorEngine::new(
        CuratorStore::in_memory(),
        Arc::new(MockAdapter),
        CuratorConfig::default(),
    );
    engine.registry().import(sources()).unwrap();

    let mut plan = specs();
    plan.push(
        SourceQuerySpec::new("stalled", "{ pools { id } }").mapping(FieldMapping::new("id", "market")),
    );

    let response = engine.execute(&plan, &Requirements::default()).await;

    assert_eq!(response.metadata.total_subgraphs, 3);
    assert_eq!(response.metadata.successful_subgraphs, 2);
    assert_eq!(response.data.len(), 3);
    assert_eq!(response.metadata.errors.len(), 1);
    assert_eq!(response.metadata.errors[0].source_id, "stalled");
    assert!(response.metadata.errors[0].error.contains("timed out"));
}

#[tokio::test]
async fn test_all_sources_failing_yields_empty_rows() {
    let engine = CuratorEngine::new(
        CuratorStore::in_memory(),
        Arc::new(MockAdapter),
        CuratorConfig::default(),
    );
    let response = engine.execute(&specs(), &Requirements::default()).await;

    assert!(response.data.is_empty());
    assert_eq!(response.metadata.successful_subgraphs, 0);
    assert_eq!(response.metadata.errors.len(), 2);
}

#[tokio::test]
async fn test_http_adapter_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let _ok = server
        .mock("POST", "/uniswap")
        .with_status(200)
        .with_body(r#"{"data": {"pools": [{"id": "0xabc", "volumeUSD": "123.456"}]}}"#)
        .create_async()
        .await;
    let _down = server
        .mock("POST", "/sushi")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let store = CuratorStore::in_memory();
    store
        .sources
        .import(vec![
            SourceDescriptor::new("uniswap", "Uniswap", format!("{}/uniswap", server.url())),
            SourceDescriptor::new("sushi", "Sushi", format!("{}/sushi", server.url())),
        ])
        .unwrap();
    let engine = CuratorEngine::new(store, Arc::new(HttpSourceAdapter::new()), CuratorConfig::default());

    let plan: Vec<SourceQuerySpec> = ["uniswap", "sushi"]
        .iter()
        .map(|id| {
            SourceQuerySpec::new(*id, "{ pools { id volumeUSD } }")
                .mapping(FieldMapping::new("id", "pool"))
                .mapping(FieldMapping::new("volumeUSD", "volume").with_transform("toFixed2"))
        })
        .collect();

    let response = engine.execute(&plan, &Requirements::default()).await;

    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0]["pool"], json!("0xabc"));
    assert_eq!(response.data[0]["volume"], json!(123.46));
    assert_eq!(response.metadata.errors[0].source_id, "sushi");
    assert!(response.metadata.errors[0].error.starts_with("HTTP 500"));
}
