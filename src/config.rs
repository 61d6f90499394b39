use crate::cache::EmbeddingCache;
use crate::candidates::VectorAnchor;
use crate::db::{schema, Db};
use crate::embeddings::OpenAIEmbedder;
use crate::engine::{Backends, EngineSettings};
use crate::graph::SqliteGraph;
use crate::model::{Direction, RelationKind};
use crate::reasoner::{CombinationPolicy, DecayPolicy, SearchParams, MAX_HOPS_LIMIT};
use crate::snapshot;
use crate::vector::{store, Metric, MAX_K};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub riskchain: RiskchainConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Optional: enables `query_text` at the service edges.
    pub embeddings: Option<EmbeddingsConfig>,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskchainConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RiskchainConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Snapshot,
}

/// Where the graph and embeddings come from
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub metric: Metric,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            db_path: default_db_path(),
            snapshot_path: None,
            metric: Metric::default(),
        }
    }
}

/// Reasoning defaults. All but `resolve_aliases` can be overridden per query;
/// the decay kind is fixed here and queries may only replace a geometric factor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub max_hops: usize,
    pub beam_width: usize,
    pub score_threshold: f64,
    pub vector_top_k: usize,
    pub direction: Direction,
    pub relation_kinds: Vec<RelationKind>,
    pub vector_anchor: VectorAnchor,
    pub resolve_aliases: bool,
    pub decay: DecayPolicy,
    pub combination: CombinationPolicy,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        let search = SearchParams::default();
        Self {
            max_hops: search.max_hops,
            beam_width: search.beam_width,
            score_threshold: search.score_threshold,
            vector_top_k: 10,
            direction: Direction::Outgoing,
            relation_kinds: Vec::new(),
            vector_anchor: VectorAnchor::Query,
            resolve_aliases: true,
            decay: search.decay,
            combination: search.combination,
        }
    }
}

/// Performance tuning configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub backend_timeout_ms: u64,
    pub max_concurrency: usize,
    pub session_cache_capacity: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            backend_timeout_ms: 2000,
            max_concurrency: 16,
            session_cache_capacity: 4096,
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    pub dimensions: Option<usize>,
    pub base_url: Option<String>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./riskchain.db")
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_max_retries() -> usize {
    3
}

fn default_http_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RISKCHAIN_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RISKCHAIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let r = &self.reasoning;
        if r.max_hops == 0 || r.max_hops > MAX_HOPS_LIMIT {
            anyhow::bail!("reasoning.max_hops must be between 1 and {}", MAX_HOPS_LIMIT);
        }
        if r.beam_width == 0 {
            anyhow::bail!("reasoning.beam_width must be greater than 0");
        }
        if !(0.0..=1.0).contains(&r.score_threshold) {
            anyhow::bail!("reasoning.score_threshold must be between 0.0 and 1.0");
        }
        if r.vector_top_k == 0 || r.vector_top_k > MAX_K {
            anyhow::bail!("reasoning.vector_top_k must be between 1 and {}", MAX_K);
        }
        r.decay.validate().context("reasoning.decay")?;
        r.combination.validate().context("reasoning.combination")?;

        if self.performance.backend_timeout_ms == 0 {
            anyhow::bail!("performance.backend_timeout_ms must be greater than 0");
        }
        if self.performance.max_concurrency == 0 {
            anyhow::bail!("performance.max_concurrency must be greater than 0");
        }

        if self.backend.kind == BackendKind::Snapshot && self.backend.snapshot_path.is_none() {
            anyhow::bail!("backend.snapshot_path is required when backend.kind = \"snapshot\"");
        }

        if let Some(embeddings) = &self.embeddings {
            std::env::var(&embeddings.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your embedding API key.",
                    embeddings.api_key_env
                )
            })?;
            if embeddings.dimensions == Some(0) {
                anyhow::bail!("embeddings.dimensions must be greater than 0");
            }
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.backend.db_path
    }

    /// Engine defaults derived from `[reasoning]` and `[performance]`
    pub fn engine_settings(&self) -> EngineSettings {
        let r = &self.reasoning;
        EngineSettings {
            search: SearchParams {
                max_hops: r.max_hops,
                beam_width: r.beam_width,
                score_threshold: r.score_threshold,
                decay: r.decay,
                combination: r.combination,
            },
            vector_top_k: r.vector_top_k,
            direction: r.direction,
            relation_kinds: r.relation_kinds.clone(),
            vector_anchor: r.vector_anchor,
            resolve_aliases: r.resolve_aliases,
            backend_timeout: Duration::from_millis(self.performance.backend_timeout_ms),
            max_concurrency: self.performance.max_concurrency,
            session_cache_capacity: self.performance.session_cache_capacity,
        }
    }

    /// Open the configured graph + vector backends
    pub async fn open_backends(&self) -> Result<Backends> {
        let metric = self.backend.metric;
        match self.backend.kind {
            BackendKind::Snapshot => {
                let path = self
                    .backend
                    .snapshot_path
                    .as_deref()
                    .context("backend.snapshot_path is not set")?;
                snapshot::load_backends(path, metric)
                    .with_context(|| format!("Failed to load snapshot {}", path.display()))
            }
            BackendKind::Sqlite => {
                let path = self.db_path();
                if !path.exists() {
                    anyhow::bail!("Graph database not found: {}", path.display());
                }
                let db = Db::new(path);
                let status = db
                    .with_read_only(|conn| schema::inspect(conn))
                    .await
                    .context("Failed to inspect graph database schema")?;
                if !status.missing_tables.is_empty() {
                    anyhow::bail!(
                        "Graph database {} is missing tables: {}",
                        path.display(),
                        status.missing_tables.join(", ")
                    );
                }
                if !status.is_ready() {
                    // Externally ingested databases may never have been stamped
                    log::warn!(
                        "Graph database {} reports schema v{} (current v{}); run `riskchain migrate`",
                        path.display(),
                        status.version,
                        schema::latest_version()
                    );
                }
                let expected_dimension = self.embeddings.as_ref().and_then(|e| e.dimensions);
                let index = store::load_index(&db, metric, expected_dimension)
                    .await
                    .context("Failed to load entity embeddings")?;
                Ok(Backends::new(Arc::new(SqliteGraph::new(db)), Arc::new(index)))
            }
        }
    }

    /// Build the embedding client when `[embeddings]` is configured
    pub fn embedder(&self) -> Result<Option<OpenAIEmbedder>> {
        let Some(embeddings) = &self.embeddings else {
            return Ok(None);
        };
        let api_key = std::env::var(&embeddings.api_key_env)
            .with_context(|| format!("Environment variable {} not set", embeddings.api_key_env))?;

        let mut embedder = OpenAIEmbedder::new(api_key, embeddings.model.clone())?;
        // Cache disabled when capacity is 0
        if embeddings.cache_capacity > 0 {
            embedder = embedder.with_cache(Arc::new(EmbeddingCache::new(embeddings.cache_capacity)));
        }
        if let Some(dimensions) = embeddings.dimensions {
            embedder = embedder.with_dimensions(dimensions);
        }
        if let Some(base_url) = &embeddings.base_url {
            embedder = embedder.with_base_url(base_url.as_str());
        }
        Ok(Some(embedder))
    }

    /// Retry budget for embedding calls
    pub fn embedding_retries(&self) -> usize {
        self.embeddings.as_ref().map(|e| e.max_retries).unwrap_or(0)
    }
}
