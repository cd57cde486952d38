//! Wire DTOs for /search.

use bundler::SearchOutcome;
use retrieval::{Modality, RankedResult};
use serde::Serialize;

/// Response payload for POST /search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub session_id: String,
    pub turn: u64,
    pub results: Vec<ResultItem>,
    /// True if any requested modality failed or timed out.
    pub partial: bool,
    /// Candidates dropped by page truncation plus bundle blocks that did
    /// not fit the character budget.
    pub omitted_count: usize,
    /// Present when more ranked candidates are available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One ranked, resolved result.
#[derive(Debug, Serialize)]
pub struct ResultItem {
    pub rank: usize,
    pub artifact_id: String,
    /// Comma-joined modality tags, e.g. `"text,image"` for a cross-modal
    /// duplicate. Matches the tag rendered in the bundle block.
    pub modality: String,
    /// Weighted normalized score in `[0, 1]`.
    pub score: f32,
    pub title: String,
    pub excerpt: String,
    pub kind: String,
    pub link: String,
}

impl From<&RankedResult> for ResultItem {
    fn from(r: &RankedResult) -> Self {
        let modality = r
            .candidate
            .modalities
            .iter()
            .map(Modality::as_str)
            .collect::<Vec<_>>()
            .join(",");
        ResultItem {
            rank: r.rank,
            artifact_id: r.candidate.artifact_id.clone(),
            modality,
            score: r.candidate.score,
            title: r.metadata.title.clone(),
            excerpt: r.metadata.excerpt.clone(),
            kind: r.metadata.kind.clone(),
            link: r.metadata.link.clone(),
        }
    }
}

impl From<&SearchOutcome> for SearchResponse {
    fn from(out: &SearchOutcome) -> Self {
        SearchResponse {
            session_id: out.session_id.clone(),
            turn: out.turn,
            results: out.results.iter().map(ResultItem::from).collect(),
            partial: out.partial,
            omitted_count: out.omitted_count,
            cursor: out.cursor.clone(),
        }
    }
}
