//! Multi-collection searcher: per-modality embed + k-NN fan-out.
//!
//! Both stages are fan-out/fan-in barriers: the request path suspends until
//! every leg completes or times out, and never blocks indefinitely on a
//! single slow backend. A failure in one leg degrades that modality to a
//! tagged outcome instead of aborting the join. Cancellation is structural:
//! dropping the returned future drops every in-flight leg with it.

use std::collections::BTreeMap;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embed::{EmbedInput, EmbeddingsProvider};
use crate::errors::RetrievalError;
use crate::qdrant_facade::VectorSearcher;
use crate::types::{Modality, ModalityOutcome, Query};

/// Per-modality outcomes collected at the fan-in barrier.
///
/// `BTreeMap` keeps iteration order deterministic for downstream fusion.
#[derive(Debug, Default)]
pub struct SearchReport {
    pub outcomes: BTreeMap<Modality, ModalityOutcome>,
}

impl SearchReport {
    /// True when any requested modality was degraded (failed or timed out).
    pub fn partial(&self) -> bool {
        self.outcomes.values().any(ModalityOutcome::is_degraded)
    }
}

/// Embeds the query once per requested modality, then fans out one k-NN call
/// per successfully embedded modality.
///
/// Each call is bounded by the configured per-call timeout. The over-fetch
/// candidate count is `limit * over_fetch_factor` per collection.
///
/// # Errors
/// Returns [`RetrievalError::EmbeddingUnavailable`] only when *every*
/// requested modality's embedding call failed; individual failures degrade
/// to tagged outcomes.
pub async fn fan_out(
    cfg: &RetrievalConfig,
    provider: &dyn EmbeddingsProvider,
    searcher: &dyn VectorSearcher,
    query: &Query,
) -> Result<SearchReport, RetrievalError> {
    let input = match (&query.text, &query.reference_artifact_id) {
        (Some(t), _) => EmbedInput::Text(t),
        (None, Some(r)) => EmbedInput::Reference(r),
        // Normalizer guarantees one of the two is present.
        (None, None) => return Err(RetrievalError::InvalidQuery("empty query".into())),
    };

    // Stage 1: embedding fan-out, one call per modality space.
    let embed_legs = query.modalities.iter().map(|&m| async move {
        let res = match timeout(cfg.embed_timeout, provider.embed(input, m)).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("embedding call timed out".to_string()),
        };
        (m, res)
    });
    let embedded = join_all(embed_legs).await;

    let mut report = SearchReport::default();
    let mut vectors: Vec<(Modality, Vec<f32>)> = Vec::with_capacity(embedded.len());
    for (m, res) in embedded {
        match res {
            Ok(v) => vectors.push((m, v)),
            Err(e) => {
                warn!(target: "retrieval::searcher", modality = %m, error = %e, "embedding degraded");
                report.outcomes.insert(m, ModalityOutcome::Failed(e));
            }
        }
    }

    if vectors.is_empty() {
        return Err(RetrievalError::EmbeddingUnavailable);
    }

    // Stage 2: k-NN fan-out over the collections we have vectors for.
    let top_k = cfg.over_fetch(query.limit.saturating_add(query.offset));
    let filters = &query.filters;
    let search_legs = vectors.into_iter().map(|(m, v)| async move {
        let outcome = match timeout(cfg.search_timeout, searcher.knn(m, v, top_k, filters)).await {
            Ok(Ok(hits)) => ModalityOutcome::Hits(hits),
            Ok(Err(e)) => {
                warn!(target: "retrieval::searcher", modality = %m, error = %e, "search failed");
                ModalityOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(target: "retrieval::searcher", modality = %m, "search timed out");
                ModalityOutcome::TimedOut
            }
        };
        (m, outcome)
    });
    for (m, outcome) in join_all(search_legs).await {
        report.outcomes.insert(m, outcome);
    }

    debug!(
        target: "retrieval::searcher",
        modalities = report.outcomes.len(),
        partial = report.partial(),
        "fan-out complete"
    );
    Ok(report)
}
