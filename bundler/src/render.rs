//! Bundle rendering: ranked results into citation-tagged text under a
//! hard character budget.
//!
//! The format is stable and consumed downstream as structured text:
//!
//! ```text
//! [1] (text,image) Title - excerpt
//!     link: https://...
//! ```
//!
//! Citation numbers are 1-based per bundle and correspond 1:1 to the
//! `results` array of the search call that produced it. A block is either
//! fully included or omitted; blocks are never cut mid-content.

use retrieval::{Modality, RankedResult};
use session_store::StoredBundle;
use tracing::debug;

/// Renders results in rank order, accumulating whole blocks until adding the
/// next one would exceed `max_chars`. The omitted count tells the caller the
/// bundle is partial.
pub fn render_bundle(results: &[RankedResult], max_chars: usize) -> StoredBundle {
    let mut text = String::new();
    let mut included = 0usize;

    for (i, r) in results.iter().enumerate() {
        let block = render_block(i + 1, r);
        if text.len() + block.len() > max_chars {
            break;
        }
        text.push_str(&block);
        included += 1;
    }

    let modalities = {
        let mut set: Vec<Modality> = Vec::new();
        for r in &results[..included] {
            for m in &r.candidate.modalities {
                if !set.contains(m) {
                    set.push(*m);
                }
            }
        }
        set.sort();
        set
    };

    debug!(
        target: "bundler::render",
        included,
        omitted = results.len() - included,
        chars = text.len(),
        "bundle rendered"
    );

    StoredBundle {
        text,
        omitted: results.len() - included,
        modalities,
        citations: included,
    }
}

fn render_block(citation: usize, r: &RankedResult) -> String {
    let tags: Vec<&str> = r.candidate.modalities.iter().map(Modality::as_str).collect();
    format!(
        "[{citation}] ({}) {} - {}\n    link: {}\n",
        tags.join(","),
        r.metadata.title.trim(),
        r.metadata.excerpt.trim(),
        r.metadata.link.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieval::{ArtifactMetadata, RankedCandidate};

    fn result(rank: usize, id: &str, excerpt: &str) -> RankedResult {
        RankedResult {
            rank,
            candidate: RankedCandidate {
                artifact_id: id.into(),
                modalities: vec![Modality::Text],
                score: 1.0 - rank as f32 * 0.1,
                local_rank: rank - 1,
            },
            metadata: ArtifactMetadata {
                title: format!("Artifact {id}"),
                excerpt: excerpt.into(),
                kind: "note".into(),
                link: format!("store://artifacts/{id}"),
            },
        }
    }

    #[test]
    fn renders_citations_in_rank_order() {
        let results = vec![result(1, "a", "first"), result(2, "b", "second")];
        let bundle = render_bundle(&results, 10_000);
        assert_eq!(bundle.citations, 2);
        assert_eq!(bundle.omitted, 0);
        let first = bundle.text.find("[1]").unwrap();
        let second = bundle.text.find("[2]").unwrap();
        assert!(first < second);
        assert!(bundle.text.contains("link: store://artifacts/a"));
    }

    #[test]
    fn budget_never_exceeded_and_blocks_never_split() {
        let results: Vec<RankedResult> = (1..=10)
            .map(|i| result(i, &format!("id{i}"), &"x".repeat(80)))
            .collect();
        let one_block = render_block(1, &results[0]).len();
        // Budget for roughly two and a half blocks.
        let budget = one_block * 2 + one_block / 2;
        let bundle = render_bundle(&results, budget);

        assert!(bundle.text.len() <= budget);
        assert_eq!(bundle.citations, 2);
        assert_eq!(bundle.omitted, 8);
        // The last included block is complete: its link line is intact.
        assert!(bundle.text.ends_with("link: store://artifacts/id2\n"));
        assert!(!bundle.text.contains("[3]"));
    }

    #[test]
    fn tight_budget_omits_everything() {
        let results = vec![result(1, "a", "excerpt")];
        let bundle = render_bundle(&results, 5);
        assert_eq!(bundle.citations, 0);
        assert_eq!(bundle.omitted, 1);
        assert!(bundle.text.is_empty());
        assert!(bundle.modalities.is_empty());
    }

    #[test]
    fn modalities_reflect_included_blocks_only() {
        let mut image_result = result(2, "img", "a picture");
        image_result.candidate.modalities = vec![Modality::Image];
        let results = vec![result(1, "a", "text one"), image_result];
        let one_block = render_block(1, &results[0]).len();
        let bundle = render_bundle(&results, one_block);
        assert_eq!(bundle.citations, 1);
        assert_eq!(bundle.modalities, vec![Modality::Text]);
    }
}
