//! `licita` — the only outer surface the core exposes (spec §1
//! Non-goals: no HTTP routing/auth here). One subcommand per inbound
//! operation in spec §6, printing JSON to stdout so the binary doubles
//! as a manual smoke-testing tool and a scriptable interface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use licita_application::use_cases::facade::{MatchingMode, RunMatchingRequest};
use licita_domain::value_objects::{OpportunityId, SearchFilters};
use licita_infrastructure::{bootstrap, ConfigLoader, LogFormat};

#[derive(Parser)]
#[command(name = "licita", about = "Licita Match engine CLI", version)]
struct Cli {
    /// Path to a TOML config file (defaults to `config/default.toml` if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fan out a query to every registered provider and return the merged, sorted result (spec §6 `unified_search`).
    UnifiedSearch {
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        region_code: Option<String>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Query exactly one provider, bypassing fan-out (spec §6 `search_by_provider`).
    SearchByProvider {
        provider_name: String,
        #[arg(long)]
        keywords: Option<String>,
    },
    /// Report per-provider registration/reachability (spec §6 `provider_stats`).
    ProviderStats,
    /// Fetch a tender's line items (spec §6 `get_items`).
    GetItems { provider_name: String, external_id: String },
    /// Force-refresh a tender's items, bypassing the adapter's cache (spec §6 `refresh_items`).
    RefreshItems { provider_name: String, external_id: String },
    /// Run the matching engine (spec §6 `run_matching`).
    RunMatching {
        /// `incremental` (default) or `full`.
        #[arg(long, default_value = "incremental")]
        mode: String,
        #[arg(long)]
        clear_matches: bool,
        #[arg(long)]
        enable_llm: bool,
        #[arg(long)]
        date_from: Option<NaiveDateTime>,
        #[arg(long)]
        date_to: Option<NaiveDateTime>,
    },
    /// Ask a question about one tender's attached documents (spec §6 `rag_query`).
    RagQuery { opportunity_id: String, query: String },
    /// Report whether a tender's documents are fully vectorized (spec §6 `vectorization_status`).
    VectorizationStatus { opportunity_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    licita_infrastructure::logging::init(if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty });

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    let config = loader.load().context("failed to load configuration")?;
    let ctx = bootstrap(&config).await.context("failed to bootstrap application context")?;
    let facade = ctx.facade;

    match cli.command {
        Command::UnifiedSearch { keywords, region_code, page_size } => {
            let filters = SearchFilters { keywords, region_code, page_size, ..Default::default() };
            let result = facade.unified_search(filters).await?;
            print_json(&serde_json::json!({
                "opportunities": result.opportunities,
                "total": result.total,
            }))?;
        }
        Command::SearchByProvider { provider_name, keywords } => {
            let filters = SearchFilters { keywords, ..Default::default() };
            let result = facade.search_by_provider(&provider_name, filters).await?;
            print_json(&serde_json::json!({
                "opportunities": result.opportunities,
                "total": result.total,
            }))?;
        }
        Command::ProviderStats => {
            let stats = facade.provider_stats();
            let rendered: Vec<_> = stats
                .into_iter()
                .map(|s| {
                    serde_json::json!({
                        "provider_name": s.provider_name,
                        "registered": s.registered,
                        "reachable": s.reachable,
                        "metadata": s.metadata,
                    })
                })
                .collect();
            print_json(&rendered)?;
        }
        Command::GetItems { provider_name, external_id } => {
            let items = facade.get_items(&provider_name, &external_id).await?;
            print_json(&items)?;
        }
        Command::RefreshItems { provider_name, external_id } => {
            let items = facade.refresh_items(&provider_name, &external_id).await?;
            print_json(&items)?;
        }
        Command::RunMatching { mode, clear_matches, enable_llm, date_from, date_to } => {
            let mode = match mode.as_str() {
                "full" => MatchingMode::Full,
                _ => MatchingMode::Incremental,
            };
            let summary = facade
                .run_matching(RunMatchingRequest { mode, vectorizer_kind: None, clear_matches, enable_llm, date_from, date_to })
                .await?;
            print_json(&serde_json::json!({
                "pairs_evaluated": summary.pairs_evaluated,
                "matched": summary.matched,
                "rejected_below_threshold": summary.rejected_below_threshold,
                "rejected_by_llm": summary.rejected_by_llm,
            }))?;
        }
        Command::RagQuery { opportunity_id, query } => {
            let answer = facade.rag_query(&OpportunityId::from_string(opportunity_id), &query).await?;
            print_json(&answer)?;
        }
        Command::VectorizationStatus { opportunity_id } => {
            let status = facade.vectorization_status(&OpportunityId::from_string(opportunity_id)).await?;
            let per_document: Vec<_> = status
                .per_document
                .into_iter()
                .map(|d| {
                    serde_json::json!({
                        "document_id": d.document_id.as_str(),
                        "chunk_count": d.chunk_count,
                        "fully_vectorized": d.fully_vectorized,
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "fully_vectorized": status.fully_vectorized,
                "per_document": per_document,
            }))?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
