//! Result fusion: normalize, weight, dedup and order heterogeneous hits.
//!
//! Raw similarity scores come from different embedding spaces and are not
//! comparable across modalities; each modality's list is min-max normalized
//! within itself before weighting. Ordering is a strict total order: score
//! descending via `total_cmp`, then collection-local rank, then artifact id.
//! Map iteration order never decides a rank.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::errors::RetrievalError;
use crate::searcher::SearchReport;
use crate::types::{Modality, ModalityOutcome, RankedCandidate};

/// Fusion policy: per-modality weights and an optional score floor.
///
/// The weighting scheme is deliberately pluggable; the default is equal
/// weighting across requested modalities.
#[derive(Clone, Debug, Default)]
pub struct RankPolicy {
    pub weights: std::collections::BTreeMap<Modality, f32>,
    pub score_floor: Option<f32>,
}

impl RankPolicy {
    pub fn from_config(cfg: &RetrievalConfig) -> Self {
        Self {
            weights: cfg.modality_weights.clone(),
            score_floor: cfg.score_floor,
        }
    }

    fn weight(&self, m: Modality) -> f32 {
        self.weights.get(&m).copied().unwrap_or(1.0)
    }
}

/// Fuses per-modality hit lists into one globally ordered, deduplicated
/// candidate list. Returns the *full* fused set; truncation to the requested
/// page is the caller's job so the over-fetched remainder can back
/// pagination.
///
/// `exclude` carries artifact ids from prior session turns when cross-turn
/// dedup is requested.
///
/// # Errors
/// Returns [`RetrievalError::NoResultsAvailable`] when every modality leg
/// failed or timed out, i.e. no result set exists at all. A healthy search
/// that matched nothing yields `Ok(vec![])`.
pub fn fuse(
    report: &SearchReport,
    policy: &RankPolicy,
    exclude: &HashSet<String>,
) -> Result<Vec<RankedCandidate>, RetrievalError> {
    if report
        .outcomes
        .values()
        .all(ModalityOutcome::is_degraded)
    {
        return Err(RetrievalError::NoResultsAvailable);
    }

    // artifact id -> best occurrence, with merged modality tags.
    let mut merged: HashMap<String, RankedCandidate> = HashMap::new();

    for (&modality, outcome) in &report.outcomes {
        let ModalityOutcome::Hits(hits) = outcome else {
            continue;
        };
        if hits.is_empty() {
            continue;
        }

        let (min, max) = hits.iter().fold((f32::MAX, f32::MIN), |(lo, hi), h| {
            (lo.min(h.score), hi.max(h.score))
        });
        let span = max - min;
        let weight = policy.weight(modality);

        for hit in hits {
            // Constant-score lists normalize to 1.0: within their own space
            // the candidates were indistinguishable.
            let normalized = if span > 0.0 { (hit.score - min) / span } else { 1.0 };
            let weighted = normalized * weight;

            match merged.get_mut(&hit.artifact_id) {
                Some(existing) => {
                    if !existing.modalities.contains(&modality) {
                        existing.modalities.push(modality);
                        existing.modalities.sort();
                    }
                    // Keep the highest-weighted occurrence's score and rank.
                    if weighted > existing.score {
                        existing.score = weighted;
                        existing.local_rank = hit.local_rank;
                    }
                }
                None => {
                    merged.insert(
                        hit.artifact_id.clone(),
                        RankedCandidate {
                            artifact_id: hit.artifact_id.clone(),
                            modalities: vec![modality],
                            score: weighted,
                            local_rank: hit.local_rank,
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<RankedCandidate> = merged
        .into_values()
        .filter(|c| !exclude.contains(&c.artifact_id))
        .filter(|c| policy.score_floor.is_none_or(|floor| c.score >= floor))
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.local_rank.cmp(&b.local_rank))
            .then_with(|| a.artifact_id.cmp(&b.artifact_id))
    });

    debug!(
        target: "retrieval::rank",
        candidates = fused.len(),
        excluded = exclude.len(),
        "fusion complete"
    );
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawHit;

    fn hit(id: &str, modality: Modality, score: f32, local_rank: usize) -> RawHit {
        RawHit {
            artifact_id: id.to_string(),
            modality,
            score,
            local_rank,
        }
    }

    fn report(legs: Vec<(Modality, ModalityOutcome)>) -> SearchReport {
        let mut r = SearchReport::default();
        for (m, o) in legs {
            r.outcomes.insert(m, o);
        }
        r
    }

    #[test]
    fn normalizes_within_each_modality() {
        let r = report(vec![(
            Modality::Text,
            ModalityOutcome::Hits(vec![
                hit("a", Modality::Text, 0.8, 0),
                hit("b", Modality::Text, 0.6, 1),
                hit("c", Modality::Text, 0.4, 2),
            ]),
        )]);
        let fused = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap();
        assert_eq!(fused[0].artifact_id, "a");
        assert_eq!(fused[0].score, 1.0);
        assert_eq!(fused[2].score, 0.0);
        assert!((fused[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn constant_score_list_normalizes_to_one() {
        let r = report(vec![(
            Modality::Image,
            ModalityOutcome::Hits(vec![hit("only", Modality::Image, 0.42, 0)]),
        )]);
        let fused = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap();
        assert_eq!(fused[0].score, 1.0);
    }

    #[test]
    fn dedup_keeps_highest_weighted_occurrence_and_merges_tags() {
        // "dup" ranks mid-list in text but top in image.
        let r = report(vec![
            (
                Modality::Text,
                ModalityOutcome::Hits(vec![
                    hit("t1", Modality::Text, 0.9, 0),
                    hit("dup", Modality::Text, 0.5, 1),
                    hit("t2", Modality::Text, 0.1, 2),
                ]),
            ),
            (
                Modality::Image,
                ModalityOutcome::Hits(vec![
                    hit("dup", Modality::Image, 0.8, 0),
                    hit("i1", Modality::Image, 0.2, 1),
                ]),
            ),
        ]);
        let fused = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap();
        let dup = fused.iter().find(|c| c.artifact_id == "dup").unwrap();
        assert_eq!(dup.modalities, vec![Modality::Text, Modality::Image]);
        // Image occurrence normalizes to 1.0 (top of its list), beating the
        // text occurrence's 0.5.
        assert_eq!(dup.score, 1.0);
        assert_eq!(dup.local_rank, 0);
        // Appears exactly once.
        assert_eq!(fused.iter().filter(|c| c.artifact_id == "dup").count(), 1);
    }

    #[test]
    fn ties_break_by_local_rank_then_id() {
        let r = report(vec![(
            Modality::Text,
            ModalityOutcome::Hits(vec![
                hit("b", Modality::Text, 0.5, 0),
                hit("a", Modality::Text, 0.5, 1),
                hit("c", Modality::Text, 0.5, 1),
            ]),
        )]);
        let fused = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap();
        let ids: Vec<&str> = fused.iter().map(|c| c.artifact_id.as_str()).collect();
        // All normalize to 1.0; local rank 0 wins, then lexicographic id.
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn weights_shift_cross_modality_order() {
        let r = report(vec![
            (
                Modality::Text,
                ModalityOutcome::Hits(vec![
                    hit("t", Modality::Text, 0.9, 0),
                    hit("t2", Modality::Text, 0.1, 1),
                ]),
            ),
            (
                Modality::Image,
                ModalityOutcome::Hits(vec![
                    hit("i", Modality::Image, 0.9, 0),
                    hit("i2", Modality::Image, 0.1, 1),
                ]),
            ),
        ]);
        let mut policy = RankPolicy::default();
        policy.weights.insert(Modality::Image, 0.5);
        let fused = fuse(&r, &policy, &HashSet::new()).unwrap();
        assert_eq!(fused[0].artifact_id, "t");
        let i = fused.iter().find(|c| c.artifact_id == "i").unwrap();
        assert_eq!(i.score, 0.5);
    }

    #[test]
    fn excluded_ids_are_dropped_before_ordering() {
        let r = report(vec![(
            Modality::Text,
            ModalityOutcome::Hits(vec![
                hit("seen", Modality::Text, 0.9, 0),
                hit("new", Modality::Text, 0.4, 1),
            ]),
        )]);
        let exclude: HashSet<String> = ["seen".to_string()].into();
        let fused = fuse(&r, &RankPolicy::default(), &exclude).unwrap();
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].artifact_id, "new");
    }

    #[test]
    fn score_floor_drops_weak_candidates() {
        let r = report(vec![(
            Modality::Text,
            ModalityOutcome::Hits(vec![
                hit("a", Modality::Text, 0.9, 0),
                hit("b", Modality::Text, 0.5, 1),
                hit("c", Modality::Text, 0.1, 2),
            ]),
        )]);
        let policy = RankPolicy {
            score_floor: Some(0.4),
            ..Default::default()
        };
        let fused = fuse(&r, &policy, &HashSet::new()).unwrap();
        let ids: Vec<&str> = fused.iter().map(|c| c.artifact_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn all_degraded_is_no_results_available() {
        let r = report(vec![
            (Modality::Text, ModalityOutcome::TimedOut),
            (Modality::Image, ModalityOutcome::Failed("down".into())),
        ]);
        let err = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap_err();
        assert!(matches!(err, RetrievalError::NoResultsAvailable));
    }

    #[test]
    fn healthy_but_empty_is_an_empty_success() {
        let r = report(vec![
            (Modality::Text, ModalityOutcome::Hits(vec![])),
            (Modality::Image, ModalityOutcome::TimedOut),
        ]);
        let fused = fuse(&r, &RankPolicy::default(), &HashSet::new()).unwrap();
        assert!(fused.is_empty());
    }

    #[test]
    fn fusion_is_deterministic_across_runs() {
        let build = || {
            report(vec![
                (
                    Modality::Text,
                    ModalityOutcome::Hits(vec![
                        hit("x", Modality::Text, 0.7, 0),
                        hit("y", Modality::Text, 0.7, 1),
                    ]),
                ),
                (
                    Modality::Image,
                    ModalityOutcome::Hits(vec![
                        hit("y", Modality::Image, 0.3, 0),
                        hit("z", Modality::Image, 0.3, 1),
                    ]),
                ),
            ])
        };
        let a = fuse(&build(), &RankPolicy::default(), &HashSet::new()).unwrap();
        let b = fuse(&build(), &RankPolicy::default(), &HashSet::new()).unwrap();
        let ids = |v: &[RankedCandidate]| {
            v.iter().map(|c| c.artifact_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&a), ids(&b));
    }
}
