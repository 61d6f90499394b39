//! One-shot reasoning CLI: run a query against the configured backends and
//! print the JSON report.

use anyhow::Context;
use clap::Parser;
use riskchain::config::BackendKind;
use riskchain::candidates::VectorAnchor;
use riskchain::model::Direction;
use riskchain::{Config, Engine, ReasoningQuery};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "reason", about = "Discover cascading risk chains from a seed entity")]
struct Args {
    /// Seed entity id (a disrupted supplier, facility, ...)
    seed: String,

    /// Risk description, embedded with the configured embedding model
    #[arg(long)]
    text: Option<String>,

    /// Read the graph from a JSON snapshot instead of the configured backend
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[arg(long)]
    max_hops: Option<usize>,

    #[arg(long)]
    beam_width: Option<usize>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    decay: Option<f64>,

    #[arg(long)]
    top_k: Option<usize>,

    /// outgoing, incoming or both
    #[arg(long)]
    direction: Option<String>,

    /// Vector search anchor per hop: query or terminal
    #[arg(long)]
    anchor: Option<String>,

    /// Only chains ending at this entity
    #[arg(long)]
    target: Option<String>,

    #[arg(long)]
    limit: Option<usize>,

    /// Print a compact ranking instead of JSON
    #[arg(long)]
    summary: bool,
}

fn parse_direction(raw: &str) -> anyhow::Result<Direction> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .with_context(|| format!("Invalid direction '{}': expected outgoing, incoming or both", raw))
}

fn parse_anchor(raw: &str) -> anyhow::Result<VectorAnchor> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .with_context(|| format!("Invalid anchor '{}': expected query or terminal", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.riskchain.log_level.as_str()),
    )
    .init();

    if let Some(path) = args.snapshot.clone() {
        config.backend.kind = BackendKind::Snapshot;
        config.backend.snapshot_path = Some(path);
    }

    let mut query = ReasoningQuery::new(args.seed.clone());
    query.max_hops = args.max_hops;
    query.beam_width = args.beam_width;
    query.score_threshold = args.threshold;
    query.decay_factor = args.decay;
    query.vector_top_k = args.top_k;
    query.target_entity_id = args.target.clone();
    query.limit = args.limit;
    if let Some(raw) = &args.direction {
        query.direction = Some(parse_direction(raw)?);
    }
    if let Some(raw) = &args.anchor {
        query.vector_anchor = Some(parse_anchor(raw)?);
    }

    if let Some(text) = &args.text {
        let embedder = config
            .embedder()?
            .context("--text requires an [embeddings] section in config.toml")?;
        query.query_vector = Some(embedder.embed_query(text, config.embedding_retries()).await?);
    }

    let backends = config.open_backends().await?;
    let engine = Engine::new(backends, config.engine_settings());

    let start = Instant::now();
    let report = engine.reason(query).await?;
    let elapsed = start.elapsed();

    if args.summary {
        println!("Seed: {}", report.seed_entity_id);
        for chain in &report.chains {
            println!(
                "{:>3}. {:<30} {:.3} [{:?}] {}",
                chain.rank,
                chain.terminal,
                chain.aggregate_score,
                chain.confidence.level,
                chain.entity_path.join(" -> ")
            );
        }
        println!(
            "\n{} chains, {} hops, {} expansions ({} failed){} in {:.2?}",
            report.chains.len(),
            report.stats.hops_completed,
            report.stats.expansions,
            report.stats.failed_expansions,
            if report.cancelled { ", cancelled" } else { "" },
            elapsed
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
