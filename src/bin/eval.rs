//! Evaluation CLI: run risk-chain cases and report P@5, R@10, MRR.

use anyhow::Context;
use clap::Parser;
use riskchain::config::BackendKind;
use riskchain::eval::{run_cases, EvalCase};
use riskchain::{Config, Engine};
use std::path::PathBuf;

/// Evaluation framework: run cases and report metrics.
#[derive(Parser, Debug)]
#[command(name = "eval")]
struct Args {
    /// Path to eval cases JSON (default: eval_cases.json).
    #[arg(long, default_value = "eval_cases.json")]
    cases: PathBuf,

    /// Evaluate against a JSON snapshot instead of the configured backend.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Minimum Precision@5 to pass.
    #[arg(long, default_value_t = 0.6)]
    min_precision: f32,

    /// Minimum Recall@10 to pass.
    #[arg(long, default_value_t = 0.8)]
    min_recall: f32,

    /// Minimum MRR to pass.
    #[arg(long, default_value_t = 0.7)]
    min_mrr: f32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(path) = args.snapshot.clone() {
        config.backend.kind = BackendKind::Snapshot;
        config.backend.snapshot_path = Some(path);
    }

    let cases_json = std::fs::read_to_string(&args.cases)
        .with_context(|| format!("Failed to read {}", args.cases.display()))?;
    let cases: Vec<EvalCase> = serde_json::from_str(&cases_json).context("Invalid cases JSON")?;
    if cases.is_empty() {
        anyhow::bail!("No cases in {}", args.cases.display());
    }

    let backends = config.open_backends().await?;
    let engine = Engine::new(backends, config.engine_settings());
    let embedder = config.embedder()?;

    println!("Running evaluation on {} cases\n", cases.len());
    let summary = run_cases(&engine, &cases, embedder.as_ref(), config.embedding_retries()).await?;

    for (case, result) in cases.iter().zip(&summary.cases) {
        println!(
            "  {}{} (P@5: {:.2}, R@10: {:.2}{})",
            result.label,
            case.category.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default(),
            result.precision * 100.0,
            result.recall * 100.0,
            if result.failed_expansions > 0 {
                format!(", {} failed expansions", result.failed_expansions)
            } else {
                String::new()
            }
        );
    }

    println!("\n=== Evaluation Results ===");
    println!("Precision@5: {:.2}%", summary.mean_precision * 100.0);
    println!("Recall@10:   {:.2}%", summary.mean_recall * 100.0);
    println!("MRR:         {:.2}", summary.mrr);

    if summary.mean_precision >= args.min_precision && summary.mean_recall >= args.min_recall && summary.mrr >= args.min_mrr {
        println!(
            "\nAll metrics pass (P@5 >= {:.0}%, R@10 >= {:.0}%, MRR >= {:.2}).",
            args.min_precision * 100.0,
            args.min_recall * 100.0,
            args.min_mrr
        );
        Ok(())
    } else {
        println!(
            "\nMetrics below threshold (P@5 >= {:.0}%, R@10 >= {:.0}%, MRR >= {:.2}).",
            args.min_precision * 100.0,
            args.min_recall * 100.0,
            args.min_mrr
        );
        std::process::exit(1);
    }
}
