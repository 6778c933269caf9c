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

//! `datacurator` command line
//!
//! Thin wrapper over [`CuratorEngine`]: manage the source registry, rank
//! sources for a request, store query sets and execute them. Results are
//! printed to stdout as JSON.

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datacurator_core::{ActionMetadata, CuratorConfig, QuerySetId, Requirements, SourceQuerySpec};
use datacurator_query::CuratorEngine;
use logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory path (overrides config file)
    #[arg(long, global = true, env = "DATACURATOR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Per-source fetch timeout in seconds (overrides config file)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import source descriptors from a JSON array file
    Import { file: PathBuf },

    /// List registered sources
    Sources {
        /// Only sources without an embedding
        #[arg(long)]
        missing_embeddings: bool,
    },

    /// Compute embeddings for sources that lack one
    Embed,

    /// Rank sources for a free-text request
    Rank {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Print a source's schema, introspecting it if needed
    Schema {
        source_id: String,

        /// Re-introspect even when a schema is cached
        #[arg(long)]
        refresh: bool,
    },

    /// Store a query plan file as a query set
    Store {
        plan: PathBuf,

        /// Label recorded with the query set
        #[arg(long)]
        path: Option<String>,
    },

    /// List stored query sets
    QuerySets,

    /// Execute a stored query set, or a plan file with --plan
    Execute {
        #[arg(required_unless_present = "plan")]
        id: Option<String>,

        #[arg(long, conflicts_with = "id")]
        plan: Option<PathBuf>,
    },

    /// Describe the action generated for a requirements file
    Metadata { requirements: PathBuf },
}

/// Query plan file: per-source queries plus the requirements they serve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlanFile {
    #[serde(rename = "subgraph_queries", alias = "source_queries", alias = "queries")]
    source_queries: Vec<SourceQuerySpec>,

    #[serde(default)]
    requirements: Requirements,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(args: &Args) -> Result<CuratorConfig> {
    let mut config = CuratorConfig::load(args.config.clone()).context("failed to load configuration")?;

    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.execution.fetch_timeout_secs = secs;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_format, "info");

    let config = load_config(&args)?;

    // Metadata is derived offline; everything else needs the store
    match args.command {
        Command::Metadata { requirements } => print_metadata(&requirements),
        command => {
            let engine = CuratorEngine::from_config(config).context("failed to open engine")?;
            run(&engine, command).await
        }
    }
}

fn print_metadata(path: &Path) -> Result<()> {
    let requirements: Requirements = read_json(path)?;
    let metadata = ActionMetadata::from_requirements(&requirements);
    print_json(&serde_json::json!({
        "name": metadata.name,
        "description": metadata.description,
        "summary": requirements.summary_lines(),
    }))
}

async fn run(engine: &CuratorEngine, command: Command) -> Result<()> {
    match command {
        Command::Import { file } => {
            let count = engine
                .registry()
                .import_file(&file)
                .with_context(|| format!("failed to import {}", file.display()))?;
            tracing::info!(count, "Sources imported");
            print_json(&serde_json::json!({ "imported": count }))
        }
        Command::Sources { missing_embeddings } => {
            let sources = if missing_embeddings {
                engine.registry().missing_embeddings()
            } else {
                engine.registry().list()
            };
            let summary: Vec<_> = sources
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "name": s.name,
                        "url": s.url,
                        "protocol": s.protocol,
                        "chain": s.chain,
                        "embedded": s.embedding.is_some(),
                        "has_schema": s.has_schema(),
                    })
                })
                .collect();
            print_json(&summary)
        }
        Command::Embed => {
            let count = engine.backfill_embeddings().await?;
            print_json(&serde_json::json!({ "embedded": count }))
        }
        Command::Rank { query } => {
            let ranked = engine.rank_sources(&query.join(" ")).await?;
            print_json(&ranked)
        }
        Command::Schema { source_id, refresh } => {
            let schema = if refresh {
                engine.refresh_schema(&source_id).await?
            } else {
                engine.ensure_schema(&source_id).await?
            };
            println!("{}", schema);
            Ok(())
        }
        Command::Store { plan, path } => {
            let plan: PlanFile = read_json(&plan)?;
            let set = match path {
                Some(path) => {
                    engine.store_query_set_at(path, plan.source_queries, plan.requirements)?
                }
                None => engine.store_query_set(plan.source_queries, plan.requirements)?,
            };
            print_json(&serde_json::json!({ "id": set.id, "path": set.path }))
        }
        Command::QuerySets => print_json(&engine.query_sets().list()),
        Command::Execute { id, plan } => {
            let response = match (id, plan) {
                (_, Some(plan)) => {
                    let plan: PlanFile = read_json(&plan)?;
                    engine.execute(&plan.source_queries, &plan.requirements).await
                }
                (Some(id), None) => {
                    engine
                        .execute_stored_query_set(&QuerySetId::from(id))
                        .await?
                }
                (None, None) => anyhow::bail!("either a query set id or --plan is required"),
            };
            print_json(&response)
        }
        Command::Metadata { requirements } => print_metadata(&requirements),
    }
}
