//! Run eval cases through an [`Engine`] and summarise the metrics.

use crate::embeddings::OpenAIEmbedder;
use crate::engine::Engine;
use crate::error::{Result, RiskchainError};
use crate::eval::{mean_reciprocal_rank, precision_at_k, recall_at_k, EvalCase};
use serde::Serialize;

pub const PRECISION_K: usize = 5;
pub const RECALL_K: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub label: String,
    pub terminals: Vec<String>,
    pub precision: f32,
    pub recall: f32,
    pub failed_expansions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub cases: Vec<CaseResult>,
    pub mean_precision: f32,
    pub mean_recall: f32,
    pub mrr: f32,
}

/// Run every case in order. A fatal query error aborts the run.
pub async fn run_cases(
    engine: &Engine,
    cases: &[EvalCase],
    embedder: Option<&OpenAIEmbedder>,
    max_retries: usize,
) -> Result<EvalSummary> {
    let mut results = Vec::with_capacity(cases.len());
    let mut rankings = Vec::with_capacity(cases.len());

    for case in cases {
        let mut query = case.query.clone();
        if query.query_vector.is_none() {
            if let Some(text) = &case.query_text {
                let embedder = embedder.ok_or_else(|| {
                    RiskchainError::InvalidInput(format!(
                        "case '{}' has query_text but no embeddings are configured",
                        case.label()
                    ))
                })?;
                query.query_vector = Some(embedder.embed_query(text, max_retries).await?);
            }
        }

        let report = engine.reason(query).await?;
        let terminals: Vec<String> = report.chains.iter().map(|c| c.terminal.clone()).collect();
        let precision = precision_at_k(&terminals, &case.expected_terminals, PRECISION_K);
        let recall = recall_at_k(&terminals, &case.expected_terminals, RECALL_K);
        log::debug!(
            "Eval case {}: {} chains, P@{} {:.2}, R@{} {:.2}",
            case.label(),
            terminals.len(),
            PRECISION_K,
            precision,
            RECALL_K,
            recall
        );

        results.push(CaseResult {
            label: case.label().to_string(),
            terminals: terminals.clone(),
            precision,
            recall,
            failed_expansions: report.stats.failed_expansions,
        });
        rankings.push(terminals);
    }

    let n = results.len().max(1) as f32;
    Ok(EvalSummary {
        mean_precision: results.iter().map(|r| r.precision).sum::<f32>() / n,
        mean_recall: results.iter().map(|r| r.recall).sum::<f32>() / n,
        mrr: mean_reciprocal_rank(cases, &rankings),
        cases: results,
    })
}
