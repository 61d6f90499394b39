//! Evaluation metrics over ranked chain terminals: Precision@K, Recall@K and
//! Mean Reciprocal Rank (MRR).

use crate::eval::EvalCase;
use std::collections::HashSet;

/// Precision at K: proportion of the top-K terminals that are expected.
/// Returns (expected count in top-K) / K. If k is 0, returns 0.0.
pub fn precision_at_k(terminals: &[String], expected: &[String], k: usize) -> f32 {
    if k == 0 {
        return 0.0;
    }
    let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let hits = terminals
        .iter()
        .take(k)
        .filter(|t| expected.contains(t.as_str()))
        .count();
    hits as f32 / k as f32
}

/// Recall at K: proportion of expected terminals that appear in the top-K.
/// With no expected terminals returns 0.0.
pub fn recall_at_k(terminals: &[String], expected: &[String], k: usize) -> f32 {
    let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
    if expected.is_empty() {
        return 0.0;
    }
    let hits = terminals
        .iter()
        .take(k)
        .filter(|t| expected.contains(t.as_str()))
        .count();
    hits as f32 / expected.len() as f32
}

/// Mean Reciprocal Rank: average of 1/rank of the first expected terminal per case.
/// Cases with no expected terminal in their results add 0. Empty input returns 0.0.
pub fn mean_reciprocal_rank(cases: &[EvalCase], results: &[Vec<String>]) -> f32 {
    if cases.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0;
    for (case, terminals) in cases.iter().zip(results.iter()) {
        if let Some(rank) = terminals.iter().position(|t| case.is_relevant(t)) {
            sum += 1.0 / (rank + 1) as f32;
        }
    }
    sum / cases.len() as f32
}
