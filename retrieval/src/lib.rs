//! Cross-modal retrieval core.
//!
//! This crate provides the building blocks of the retrieval pipeline:
//! - Normalize a raw request into a canonical query
//! - Fan out one embedding + one k-NN call per requested modality
//! - Fuse heterogeneous hit lists into one deterministic ranking
//! - Resolve surviving candidates against the artifact store
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules. The vector index, embedding generation, and artifact
//! storage are external collaborators reached through the
//! [`VectorSearcher`], [`EmbeddingsProvider`] and [`ArtifactResolver`]
//! traits.

mod config;
mod errors;
mod qdrant_facade;
mod rank;
mod searcher;
mod types;

pub mod embed;
pub mod query;
pub mod resolve;

pub use config::{MAX_LIMIT, RetrievalConfig};
pub use embed::{EmbedInput, EmbeddingsProvider};
pub use errors::RetrievalError;
pub use qdrant_facade::{QdrantFacade, VectorSearcher};
pub use query::{Cursor, RawSearchRequest, normalize};
pub use rank::{RankPolicy, fuse};
pub use resolve::{ArtifactResolver, ArtifactServiceConfig, HttpResolver};
pub use searcher::{SearchReport, fan_out};
pub use types::{
    ArtifactMetadata, Modality, ModalityOutcome, Query, QueryFilters, RangeFilter,
    RankedCandidate, RankedResult, RawHit,
};
