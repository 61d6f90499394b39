use thiserror::Error;

/// Main error type for riskchain
#[derive(Error, Debug)]
pub enum RiskchainError {
    /// The query seed is not present in the graph (fatal for the query)
    #[error("Seed entity not found: {0}")]
    SeedNotFound(String),

    /// The vector index has no vectors loaded
    #[error("Vector index is empty")]
    IndexEmpty,

    /// Query vector dimension differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A backend call exceeded the per-call timeout
    #[error("Backend timeout during {operation} for entity {entity_id}")]
    BackendTimeout { operation: String, entity_id: String },

    /// Entity absent during a neighbor lookup
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Backend failure that is not a timeout (panicked task, broken handle)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RiskchainError {
    /// Errors that only degrade one expansion branch instead of failing the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RiskchainError::BackendTimeout { .. }
                | RiskchainError::EntityNotFound(_)
                | RiskchainError::Backend(_)
                | RiskchainError::Database(_)
        )
    }

    /// Short machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskchainError::SeedNotFound(_) => "seed_not_found",
            RiskchainError::IndexEmpty => "index_empty",
            RiskchainError::DimensionMismatch { .. } => "dimension_mismatch",
            RiskchainError::BackendTimeout { .. } => "backend_timeout",
            RiskchainError::EntityNotFound(_) => "entity_not_found",
            RiskchainError::Backend(_) => "backend",
            RiskchainError::Database(_) => "database",
            RiskchainError::Io(_) => "io",
            RiskchainError::Json(_) => "json",
            RiskchainError::Config(_) => "config",
            RiskchainError::Embedding(_) => "embedding",
            RiskchainError::InvalidInput(_) => "invalid_input",
        }
    }
}

/// Convenient Result type using RiskchainError
pub type Result<T> = std::result::Result<T, RiskchainError>;
