//! Search pipeline orchestration with a single public entry point.
//!
//! [`SearchEngine::search`] drives the whole flow: normalize the raw
//! request, fan out embeddings and k-NN calls per modality, fuse and rank
//! the heterogeneous hits, resolve the surviving candidates, render the
//! citation bundle, and record the turn in the caller's session. Pagination
//! against a prior turn serves from that turn's candidate snapshot; a cursor
//! offset outside the snapshot is rejected as invalid.

mod render;

pub use render::render_bundle;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use retrieval::{
    ArtifactResolver, Cursor, EmbeddingsProvider, Query, RankPolicy, RankedCandidate,
    RankedResult, RawSearchRequest, RetrievalError, RetrievalConfig, VectorSearcher, fan_out,
    fuse, normalize,
};
use session_store::{Session, SessionStore, StoredBundle};

/// Result of one search or pagination call.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub session_id: String,
    pub turn: u64,
    /// Resolved results for the served page, globally ranked without ties.
    pub results: Vec<RankedResult>,
    /// True when any requested modality failed or timed out.
    pub partial: bool,
    /// Candidates beyond the served page plus bundle blocks that did not
    /// fit the character budget.
    pub omitted_count: usize,
    /// Present when more ranked candidates are available.
    pub cursor: Option<String>,
    pub bundle: StoredBundle,
}

/// A session's most recent rendered bundle.
#[derive(Clone, Debug)]
pub struct BundleView {
    pub session_id: String,
    pub turn: u64,
    pub text: String,
    pub omitted: usize,
    pub modalities: Vec<retrieval::Modality>,
}

/// Wires the boundary collaborators and the session store into one engine.
pub struct SearchEngine {
    cfg: RetrievalConfig,
    provider: Arc<dyn EmbeddingsProvider>,
    searcher: Arc<dyn VectorSearcher>,
    resolver: Arc<dyn ArtifactResolver>,
    sessions: Arc<SessionStore>,
}

impl SearchEngine {
    pub fn new(
        cfg: RetrievalConfig,
        provider: Arc<dyn EmbeddingsProvider>,
        searcher: Arc<dyn VectorSearcher>,
        resolver: Arc<dyn ArtifactResolver>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            cfg,
            provider,
            searcher,
            resolver,
            sessions,
        }
    }

    /// Runs one search or pagination call end to end.
    ///
    /// # Errors
    /// Structural errors (`InvalidQuery`, `SessionNotFound`,
    /// `SessionExpired`, `InvalidCursor`) and whole-pipeline failures
    /// (`EmbeddingUnavailable`, `NoResultsAvailable`) propagate; per-modality
    /// degradations surface as `partial: true` instead.
    pub async fn search(&self, raw: &RawSearchRequest) -> Result<SearchOutcome, RetrievalError> {
        let (query, cursor) = normalize(raw)?;

        if let Some(cursor) = cursor {
            return self.continue_from_cursor(cursor).await;
        }

        let session = match raw.session_id.as_deref() {
            Some(id) => self.sessions.get(id).await?,
            None => self.sessions.create().await,
        };
        self.run_pipeline(session, query).await
    }

    /// Returns the most recent bundle recorded for a session, if any.
    pub async fn bundle(&self, session_id: &str) -> Result<Option<BundleView>, RetrievalError> {
        let session = self.sessions.get(session_id).await?;
        let guard = session.lock().await;
        Ok(guard.last_turn().and_then(|turn| {
            turn.bundle.as_ref().map(|b| BundleView {
                session_id: guard.id.clone(),
                turn: turn.number,
                text: b.text.clone(),
                omitted: b.omitted,
                modalities: b.modalities.clone(),
            })
        }))
    }

    /// Serves a continuation from the referenced turn's candidate snapshot.
    ///
    /// Issued cursors always point inside the snapshot, so an offset at or
    /// past its end can only come from a tampered or corrupted cursor and is
    /// rejected as `InvalidCursor`.
    async fn continue_from_cursor(&self, cursor: Cursor) -> Result<SearchOutcome, RetrievalError> {
        let session = self.sessions.get(&cursor.session_id).await?;

        let snapshot = {
            let guard = session.lock().await;
            guard
                .turn(cursor.turn)
                .cloned()
                .ok_or_else(|| RetrievalError::InvalidCursor(cursor.encode()))?
        };

        if cursor.offset >= snapshot.candidates.len() {
            return Err(RetrievalError::InvalidCursor(cursor.encode()));
        }

        debug!(
            target: "bundler::pipeline",
            session = %cursor.session_id,
            turn = cursor.turn,
            offset = cursor.offset,
            "serving page from snapshot"
        );
        let mut query = snapshot.query.clone();
        query.offset = cursor.offset;
        self.serve_page(session, query, snapshot.candidates, snapshot.partial)
            .await
    }

    async fn run_pipeline(
        &self,
        session: Arc<Mutex<Session>>,
        query: Query,
    ) -> Result<SearchOutcome, RetrievalError> {
        let exclude: HashSet<String> = if query.dedup_across_turns {
            session.lock().await.seen_artifacts()
        } else {
            HashSet::new()
        };

        let report = fan_out(
            &self.cfg,
            self.provider.as_ref(),
            self.searcher.as_ref(),
            &query,
        )
        .await?;
        let partial = report.partial();

        let policy = RankPolicy::from_config(&self.cfg);
        let fused = fuse(&report, &policy, &exclude)?;

        self.serve_page(session, query, fused, partial).await
    }

    /// Resolves and bundles one page out of the fused candidate set, then
    /// records the turn. The session lock is only taken after all backend
    /// calls have completed.
    async fn serve_page(
        &self,
        session: Arc<Mutex<Session>>,
        query: Query,
        candidates: Vec<RankedCandidate>,
        partial: bool,
    ) -> Result<SearchOutcome, RetrievalError> {
        let offset = query.offset;
        let page: Vec<RankedCandidate> = candidates
            .iter()
            .skip(offset)
            .take(query.limit)
            .cloned()
            .collect();

        let results = self.resolve_page(&page, offset).await;
        let served: Vec<String> = results
            .iter()
            .map(|r| r.candidate.artifact_id.clone())
            .collect();

        let bundle = render_bundle(&results, self.cfg.bundle_max_chars);
        let truncation_omitted = candidates.len().saturating_sub(offset + page.len());
        let omitted_count = truncation_omitted + bundle.omitted;
        let next_offset = offset + page.len();
        let has_more = next_offset < candidates.len();

        let (session_id, turn) = {
            let mut guard = session.lock().await;
            let id = guard.id.clone();
            let turn = guard.record_turn(query, candidates, served, partial, Some(bundle.clone()));
            (id, turn)
        };

        let cursor = has_more.then(|| {
            Cursor {
                session_id: session_id.clone(),
                turn,
                offset: next_offset,
            }
            .encode()
        });

        info!(
            target: "bundler::pipeline",
            session = %session_id,
            turn,
            results = results.len(),
            partial,
            omitted = omitted_count,
            "search served"
        );

        Ok(SearchOutcome {
            session_id,
            turn,
            results,
            partial,
            omitted_count,
            cursor,
            bundle,
        })
    }

    /// Resolves a page of candidates concurrently, each call bounded by the
    /// resolve timeout. Vanished artifacts and resolver hiccups drop that
    /// single result, never the request.
    async fn resolve_page(&self, page: &[RankedCandidate], offset: usize) -> Vec<RankedResult> {
        let legs = page.iter().map(|c| async move {
            match timeout(self.cfg.resolve_timeout, self.resolver.resolve(&c.artifact_id)).await {
                Ok(Ok(Some(metadata))) => Some((c.clone(), metadata)),
                Ok(Ok(None)) => None,
                Ok(Err(e)) => {
                    warn!(
                        target: "bundler::pipeline",
                        artifact = %c.artifact_id,
                        error = %e,
                        "resolver error, dropping result"
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        target: "bundler::pipeline",
                        artifact = %c.artifact_id,
                        "resolver timed out, dropping result"
                    );
                    None
                }
            }
        });

        join_all(legs)
            .await
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, (candidate, metadata))| RankedResult {
                rank: offset + i + 1,
                candidate,
                metadata,
            })
            .collect()
    }
}
