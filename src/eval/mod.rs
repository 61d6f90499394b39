//! Evaluation framework: risk-chain cases, metrics (P@K, R@K, MRR), and runner.

pub mod case;
pub mod metrics;
pub mod runner;

pub use case::EvalCase;
pub use metrics::{mean_reciprocal_rank, precision_at_k, recall_at_k};
pub use runner::{run_cases, CaseResult, EvalSummary};
