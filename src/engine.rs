//! Reasoning query API.
//!
//! [`Engine`] owns read-only backend handles and default settings. Every call
//! to [`Engine::reason`] opens a fresh session (own cache, own cancel flag),
//! so concurrent queries never share mutable state.

use crate::aggregate::{aggregate, RiskChain};
use crate::candidates::{CandidateGenerator, GeneratorSettings, VectorAnchor};
use crate::error::{Result, RiskchainError};
use crate::graph::{normalize_entity_id, GraphBackend};
use crate::model::{Direction, RelationKind};
use crate::reasoner::{CancelSignal, ExpansionStats, Reasoner, SearchParams, Session};
use crate::vector::{VectorIndex, MAX_K};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, read-only backend handles.
#[derive(Clone)]
pub struct Backends {
    pub graph: Arc<dyn GraphBackend>,
    pub index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    pub fn new(graph: Arc<dyn GraphBackend>, index: Arc<dyn VectorIndex>) -> Self {
        Self { graph, index }
    }
}

/// Defaults applied to every query unless overridden.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub search: SearchParams,
    pub vector_top_k: usize,
    pub direction: Direction,
    pub relation_kinds: Vec<RelationKind>,
    pub vector_anchor: VectorAnchor,
    pub resolve_aliases: bool,
    pub backend_timeout: Duration,
    pub max_concurrency: usize,
    pub session_cache_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            vector_top_k: 10,
            direction: Direction::Outgoing,
            relation_kinds: Vec::new(),
            vector_anchor: VectorAnchor::Query,
            resolve_aliases: true,
            backend_timeout: Duration::from_millis(2000),
            max_concurrency: 16,
            session_cache_capacity: 4096,
        }
    }
}

/// One reasoning request. Unset fields fall back to [`EngineSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningQuery {
    pub seed_entity_id: String,
    /// Externally embedded query. Absent: the seed's own embedding, if any.
    pub query_vector: Option<Vec<f32>>,
    pub max_hops: Option<usize>,
    pub beam_width: Option<usize>,
    pub score_threshold: Option<f64>,
    pub decay_factor: Option<f64>,
    pub graph_weight: Option<f64>,
    pub vector_weight: Option<f64>,
    pub vector_top_k: Option<usize>,
    pub direction: Option<Direction>,
    pub relation_kinds: Option<Vec<RelationKind>>,
    pub vector_anchor: Option<VectorAnchor>,
    /// Keep only chains ending at this entity.
    pub target_entity_id: Option<String>,
    pub limit: Option<usize>,
}

impl ReasoningQuery {
    pub fn new(seed_entity_id: impl Into<String>) -> Self {
        Self {
            seed_entity_id: seed_entity_id.into(),
            ..Self::default()
        }
    }

    pub fn with_query_vector(mut self, vector: Vec<f32>) -> Self {
        self.query_vector = Some(vector);
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = Some(beam_width);
        self
    }

    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

/// Ranked output of one query.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningReport {
    /// Seed actually used (after alias resolution).
    pub seed_entity_id: String,
    pub chains: Vec<RiskChain>,
    pub stats: ExpansionStats,
    /// True when the query was cancelled and `chains` covers fewer hops.
    pub cancelled: bool,
    /// SHA-256 of the serialized chains; equal inputs give equal digests.
    pub digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub graph_healthy: bool,
    pub index_healthy: bool,
    pub index_size: usize,
    pub index_dimension: usize,
}

/// SHA-256 hex digest of the JSON form of `chains`.
pub fn chains_digest(chains: &[RiskChain]) -> Result<String> {
    let bytes = serde_json::to_vec(chains)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

pub struct Engine {
    backends: Backends,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(backends: Backends, settings: EngineSettings) -> Self {
        Self { backends, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    fn resolve_params(&self, query: &ReasoningQuery) -> Result<SearchParams> {
        let defaults = &self.settings.search;
        let mut combination = defaults.combination;
        if let Some(w) = query.graph_weight {
            combination.graph_weight = w;
        }
        if let Some(w) = query.vector_weight {
            combination.vector_weight = w;
        }
        let params = SearchParams {
            max_hops: query.max_hops.unwrap_or(defaults.max_hops),
            beam_width: query.beam_width.unwrap_or(defaults.beam_width),
            score_threshold: query.score_threshold.unwrap_or(defaults.score_threshold),
            decay: match query.decay_factor {
                Some(factor) => defaults.decay.with_factor(factor)?,
                None => defaults.decay,
            },
            combination,
        };
        params.validate()?;
        Ok(params)
    }

    fn generator_settings(&self, query: &ReasoningQuery) -> Result<GeneratorSettings> {
        let vector_top_k = query.vector_top_k.unwrap_or(self.settings.vector_top_k);
        if vector_top_k == 0 || vector_top_k > MAX_K {
            return Err(RiskchainError::InvalidInput(format!(
                "vector_top_k must be between 1 and {}, got {}",
                MAX_K, vector_top_k
            )));
        }
        Ok(GeneratorSettings {
            vector_top_k,
            direction: query.direction.unwrap_or(self.settings.direction),
            relation_kinds: query
                .relation_kinds
                .clone()
                .unwrap_or_else(|| self.settings.relation_kinds.clone()),
            anchor: query.vector_anchor.unwrap_or(self.settings.vector_anchor),
            backend_timeout: self.settings.backend_timeout,
        })
    }

    /// Query vector for the session; index-level errors are fatal here.
    fn query_vector(&self, query: &ReasoningQuery, seed: &str) -> Result<Option<Arc<Vec<f32>>>> {
        let index = &self.backends.index;
        let vector = match &query.query_vector {
            Some(v) => v.clone(),
            None => match index.embedding(seed) {
                Some(own) => own,
                None => {
                    log::debug!("No query vector and {} is not embedded; graph-only reasoning", seed);
                    return Ok(None);
                }
            },
        };
        if index.is_empty() {
            return Err(RiskchainError::IndexEmpty);
        }
        if vector.len() != index.dimension() {
            return Err(RiskchainError::DimensionMismatch {
                expected: index.dimension(),
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RiskchainError::InvalidInput(
                "query_vector contains non-finite values".to_string(),
            ));
        }
        Ok(Some(Arc::new(vector)))
    }

    /// Seed as given, else its normalized alias, else a stored id that
    /// matches either of those ignoring case (`Facility A` -> `facility_A`).
    async fn resolve_seed(&self, generator: &CandidateGenerator, seed: &str) -> Result<String> {
        if generator.exists(seed).await? {
            return Ok(seed.to_string());
        }
        if self.settings.resolve_aliases {
            let alias = normalize_entity_id(seed);
            if alias != seed && generator.exists(&alias).await? {
                log::info!("Resolved seed {:?} to {}", seed, alias);
                return Ok(alias);
            }
            let raw = seed.trim();
            for key in [alias.as_str(), raw] {
                if key.is_empty() {
                    continue;
                }
                if let Some(found) = generator.find_ignore_case(key).await? {
                    log::info!("Resolved seed {:?} to {} ignoring case", seed, found);
                    return Ok(found);
                }
            }
        }
        Err(RiskchainError::SeedNotFound(seed.to_string()))
    }

    pub async fn reason(&self, query: ReasoningQuery) -> Result<ReasoningReport> {
        self.reason_with_cancel(query, CancelSignal::new()).await
    }

    /// Run one query; `cancel` may be triggered from another task.
    pub async fn reason_with_cancel(&self, query: ReasoningQuery, cancel: CancelSignal) -> Result<ReasoningReport> {
        let start = Instant::now();
        if query.seed_entity_id.trim().is_empty() {
            return Err(RiskchainError::InvalidInput("seed_entity_id is required".to_string()));
        }
        if query.limit == Some(0) {
            return Err(RiskchainError::InvalidInput("limit must be at least 1".to_string()));
        }
        let params = self.resolve_params(&query)?;
        let generator_settings = self.generator_settings(&query)?;

        let session = Session::new(self.settings.session_cache_capacity, cancel);
        let generator = CandidateGenerator::new(
            Arc::clone(&self.backends.graph),
            Arc::clone(&self.backends.index),
            generator_settings,
            session.cache(),
        );

        let seed = self.resolve_seed(&generator, &query.seed_entity_id).await?;
        if let Some(target) = &query.target_entity_id {
            if !generator.exists(target).await? {
                return Err(RiskchainError::EntityNotFound(target.clone()));
            }
        }
        let query_vector = self.query_vector(&query, &seed)?;

        let reasoner = Reasoner::new(generator, params, self.settings.max_concurrency);
        let mut outcome = reasoner.run(&seed, query_vector, &session).await?;

        if let Some(target) = &query.target_entity_id {
            outcome.paths.retain(|p| p.terminal() == target);
        }
        let mut chains = aggregate(&outcome.paths);
        if let Some(limit) = query.limit {
            chains.truncate(limit);
        }
        let digest = chains_digest(&chains)?;

        log::info!(
            "[session {}] {} chains for {} in {:?}{}",
            session.id(),
            chains.len(),
            seed,
            start.elapsed(),
            if outcome.cancelled { " (cancelled)" } else { "" }
        );

        Ok(ReasoningReport {
            seed_entity_id: seed,
            chains,
            stats: outcome.stats,
            cancelled: outcome.cancelled,
            digest,
        })
    }

    pub async fn health(&self) -> HealthReport {
        let graph = Arc::clone(&self.backends.graph);
        let graph_healthy = tokio::time::timeout(
            self.settings.backend_timeout,
            tokio::task::spawn_blocking(move || graph.is_healthy()),
        )
        .await
        .map(|joined| joined.unwrap_or(false))
        .unwrap_or(false);

        let index = &self.backends.index;
        let index_healthy = index.is_healthy();
        HealthReport {
            status: if graph_healthy && index_healthy { "ok" } else { "degraded" },
            graph_healthy,
            index_healthy,
            index_size: index.len(),
            index_dimension: index.dimension(),
        }
    }
}
