//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for retrieval operations.
///
/// Per-modality degradations (one embedding failing, one collection timing
/// out) are *not* errors at this level; they are carried as
/// [`crate::types::ModalityOutcome`] tags and surface as `partial: true`.
/// Variants here are either structural client errors or whole-pipeline
/// failures.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed or empty request; surfaced directly, never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Every requested modality's embedding call failed.
    #[error("embedding unavailable for all requested modalities")]
    EmbeddingUnavailable,

    /// Every modality's search leg failed or timed out; no result set exists.
    /// Distinct from a legitimately empty match set.
    #[error("no results available: all modality searches failed or timed out")]
    NoResultsAvailable,

    /// Continuation referenced a session id this store has never seen
    /// (or one already garbage-collected).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Continuation referenced a session past its idle TTL.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Continuation cursor could not be parsed or referenced a stale turn.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Embedding provider returned a vector of the wrong dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),

    /// HTTP/transport errors when calling a collaborator.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
