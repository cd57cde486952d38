//! Core data models used across the retrieval pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content modality, i.e. the embedding space a collection is indexed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Plain text documents and chunks.
    Text,
    /// Image embeddings (CLIP-style space).
    Image,
    /// Video-derived text (transcripts, frame captions).
    Video,
}

impl Modality {
    /// All supported modalities, in canonical order.
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Image, Modality::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Video => "video",
        }
    }

    /// Parses a lowercase modality name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Modality> {
        match s {
            "text" => Some(Modality::Text),
            "image" => Some(Modality::Image),
            "video" => Some(Modality::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric range constraint on a payload field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RangeFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Structured payload filters: exact equality plus numeric ranges.
///
/// Keys are validated against an allow-list at the query boundary; by the
/// time a filter reaches the searcher it only carries recognized keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Exact match on a field, e.g. `("source", "camera_roll")`.
    pub equals: Vec<(String, Value)>,
    /// Range match on a numeric field, e.g. `("duration_s", {min: 10})`.
    pub ranges: Vec<(String, RangeFilter)>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.ranges.is_empty()
    }
}

/// Canonical, validated search request.
///
/// Invariants (enforced by the query normalizer):
/// - at least one of `text` / `reference_artifact_id` is present;
/// - `modalities` is non-empty and deduplicated;
/// - `limit` is within `1..=max_limit`.
#[derive(Clone, Debug)]
pub struct Query {
    pub text: Option<String>,
    pub reference_artifact_id: Option<String>,
    pub modalities: Vec<Modality>,
    pub filters: QueryFilters,
    pub limit: usize,
    /// Offset into the fused candidate set (0 for a fresh search).
    pub offset: usize,
    /// Drop artifacts already surfaced in earlier turns of the same session.
    pub dedup_across_turns: bool,
}

/// One per-collection search result, local to a single modality.
///
/// `score` is the backend's raw similarity and is not comparable across
/// modalities; `local_rank` is the 0-based position within that collection's
/// response.
#[derive(Clone, Debug)]
pub struct RawHit {
    pub artifact_id: String,
    pub modality: Modality,
    pub score: f32,
    pub local_rank: usize,
}

/// A fused candidate after normalization, weighting and dedup.
///
/// Candidates are globally ordered but not yet resolved against the artifact
/// store; this is the shape kept in session snapshots for pagination.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub artifact_id: String,
    /// Every modality space the artifact surfaced in, canonically ordered.
    pub modalities: Vec<Modality>,
    /// Weighted, min-max-normalized score in `[0, 1]`.
    pub score: f32,
    /// Collection-local rank of the kept (highest-scoring) occurrence.
    pub local_rank: usize,
}

/// Descriptive metadata for a resolved artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub title: String,
    pub excerpt: String,
    /// Artifact type as reported by the resolver, e.g. "photo", "note".
    pub kind: String,
    /// Stable, resolvable reference link.
    pub link: String,
}

/// A candidate enriched with its global rank and resolved metadata.
#[derive(Clone, Debug)]
pub struct RankedResult {
    /// 1-based global rank; a strict total order (no ties).
    pub rank: usize,
    pub candidate: RankedCandidate,
    pub metadata: ArtifactMetadata,
}

/// Outcome of one modality's search leg, collected at the fan-in barrier.
#[derive(Clone, Debug)]
pub enum ModalityOutcome {
    /// The collection answered; the list may legitimately be empty.
    Hits(Vec<RawHit>),
    /// The per-call deadline elapsed before the collection answered.
    TimedOut,
    /// The embedding or search call failed outright.
    Failed(String),
}

impl ModalityOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ModalityOutcome::Hits(_))
    }
}
