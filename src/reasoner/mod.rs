//! Multi-hop reasoner: width-bounded beam search over hybrid candidates.
//!
//! Each hop expands every frontier path concurrently, joins, then scores,
//! prunes by threshold and caps the frontier at the beam width. Ordering
//! never depends on task scheduling: results are re-indexed by frontier
//! position before scoring, and every sort breaks ties by entity id.

pub mod scoring;
pub mod session;

pub use scoring::{CombinationPolicy, DecayPolicy};
pub use session::{CancelSignal, Session};

use crate::candidates::CandidateGenerator;
use crate::error::{Result, RiskchainError};
use crate::model::{Candidate, Path, PathStep};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Largest accepted hop limit.
pub const MAX_HOPS_LIMIT: usize = 16;

/// Fully resolved search parameters for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub max_hops: usize,
    pub beam_width: usize,
    pub score_threshold: f64,
    pub decay: DecayPolicy,
    pub combination: CombinationPolicy,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_hops: 4,
            beam_width: 500,
            score_threshold: 0.05,
            decay: DecayPolicy::default(),
            combination: CombinationPolicy::default(),
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_hops == 0 || self.max_hops > MAX_HOPS_LIMIT {
            return Err(RiskchainError::InvalidInput(format!(
                "max_hops must be in 1..={}, got {}",
                MAX_HOPS_LIMIT, self.max_hops
            )));
        }
        if self.beam_width == 0 {
            return Err(RiskchainError::InvalidInput("beam_width must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(RiskchainError::InvalidInput(format!(
                "score_threshold must be in [0,1], got {}",
                self.score_threshold
            )));
        }
        self.decay.validate()?;
        self.combination.validate()
    }
}

/// Coverage counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub hops_completed: usize,
    /// Frontier members whose candidates were generated.
    pub expansions: usize,
    /// Frontier members skipped after a timeout or backend failure.
    pub failed_expansions: usize,
    pub candidates_considered: usize,
    pub cycles_skipped: usize,
    pub pruned_by_threshold: usize,
    pub pruned_by_width: usize,
}

/// Raw reasoner output, before aggregation.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    /// Every path retained at any hop, best first. The seed path is not included.
    pub paths: Vec<Path>,
    pub stats: ExpansionStats,
    pub cancelled: bool,
}

pub struct Reasoner {
    generator: Arc<CandidateGenerator>,
    params: SearchParams,
    max_concurrency: usize,
}

impl Reasoner {
    pub fn new(generator: CandidateGenerator, params: SearchParams, max_concurrency: usize) -> Self {
        Self {
            generator: Arc::new(generator),
            params,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Extend `path` by `candidate` unless it would revisit an entity.
    fn extend(&self, path: &Path, candidate: Candidate, hop: usize) -> Option<Path> {
        if path.contains(&candidate.entity_id) {
            return None;
        }
        let edge_score = self.params.combination.edge_score(&candidate);
        let score = path.score * self.params.decay.at(hop) * edge_score;
        let step = PathStep {
            entity_id: candidate.entity_id,
            origin: candidate.origin,
            relation: candidate.relation,
            similarity: candidate.similarity,
            edge_score,
        };
        Some(path.extend(step, score))
    }

    /// Expand every frontier member concurrently; slot `i` holds member `i`'s result.
    async fn expand_frontier(
        &self,
        frontier: &[Path],
        hop: usize,
        query: Option<&Arc<Vec<f32>>>,
        stats: &mut ExpansionStats,
    ) -> Vec<Option<Vec<Candidate>>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (idx, path) in frontier.iter().enumerate() {
            let generator = Arc::clone(&self.generator);
            let semaphore = Arc::clone(&semaphore);
            let terminal = path.terminal().to_string();
            let query = query.cloned();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = generator.generate(&terminal, hop, query.as_ref()).await;
                (idx, terminal, result)
            });
        }

        let mut slots: Vec<Option<Vec<Candidate>>> = vec![None; frontier.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, _, Ok(candidates))) => {
                    stats.expansions += 1;
                    slots[idx] = Some(candidates);
                }
                Ok((_, terminal, Err(e))) => {
                    stats.failed_expansions += 1;
                    if e.is_recoverable() {
                        log::warn!("Skipping expansion of {} at hop {}: {}", terminal, hop, e);
                    } else {
                        log::error!("Skipping expansion of {} at hop {} ({}): {}", terminal, hop, e.kind(), e);
                    }
                }
                Err(e) => {
                    stats.failed_expansions += 1;
                    log::warn!("Expansion task failed at hop {}: {}", hop, e);
                }
            }
        }
        slots
    }

    /// Beam search from `seed`.
    ///
    /// Fails with `SeedNotFound` before any expansion when the seed is absent.
    /// Cancellation between hops returns what was retained so far.
    pub async fn run(&self, seed: &str, query: Option<Arc<Vec<f32>>>, session: &Session) -> Result<ReasoningOutcome> {
        let start = Instant::now();
        if !self.generator.exists(seed).await? {
            return Err(RiskchainError::SeedNotFound(seed.to_string()));
        }

        log::info!(
            "[session {}] reasoning from {} (H={}, W={}, tau={})",
            session.id(),
            seed,
            self.params.max_hops,
            self.params.beam_width,
            self.params.score_threshold
        );

        let mut stats = ExpansionStats::default();
        let mut frontier = vec![Path::seed(seed)];
        let mut retained: Vec<Path> = Vec::new();
        let mut cancelled = false;

        for hop in 1..=self.params.max_hops {
            if session.cancel_signal().is_cancelled() {
                log::info!("[session {}] cancelled before hop {}", session.id(), hop);
                cancelled = true;
                break;
            }
            if frontier.is_empty() {
                break;
            }

            let hop_start = Instant::now();
            let expansions = self.expand_frontier(&frontier, hop, query.as_ref(), &mut stats).await;

            let mut next = Vec::new();
            for (path, candidates) in frontier.iter().zip(expansions) {
                let Some(candidates) = candidates else {
                    continue;
                };
                for candidate in candidates {
                    stats.candidates_considered += 1;
                    let Some(extended) = self.extend(path, candidate, hop) else {
                        stats.cycles_skipped += 1;
                        continue;
                    };
                    if extended.score < self.params.score_threshold {
                        stats.pruned_by_threshold += 1;
                        continue;
                    }
                    next.push(extended);
                }
            }

            next.sort_by(|a, b| a.rank_cmp(b));
            if next.len() > self.params.beam_width {
                stats.pruned_by_width += next.len() - self.params.beam_width;
                next.truncate(self.params.beam_width);
            }

            log::debug!(
                "[session {}] hop {}: frontier {} -> {} in {:?}",
                session.id(),
                hop,
                frontier.len(),
                next.len(),
                hop_start.elapsed()
            );

            retained.extend(next.iter().cloned());
            frontier = next;
            stats.hops_completed = hop;
        }

        retained.sort_by(|a, b| a.rank_cmp(b));
        log::info!(
            "[session {}] {} paths retained after {} hops ({} failed expansions) in {:?}",
            session.id(),
            retained.len(),
            stats.hops_completed,
            stats.failed_expansions,
            start.elapsed()
        );

        Ok(ReasoningOutcome {
            paths: retained,
            stats,
            cancelled,
        })
    }
}
