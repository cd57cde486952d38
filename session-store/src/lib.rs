//! Keyed session store for multi-turn search continuity.
//!
//! One session per caller conversation, identified by an opaque uuid. Each
//! search or pagination call appends a turn holding the query and the full
//! fused candidate snapshot, so pagination can serve later pages without
//! re-running the pipeline. Sessions move `Created → Active → Expired`;
//! expiry is idle-TTL based, detected lazily on access and collected by a
//! periodic sweep.
//!
//! Locking discipline: the store-level map uses a `RwLock` held only for map
//! lookups; all per-session mutation happens under that session's own
//! `Mutex`, which callers must never hold across a backend network call.
//! Sessions are independent, so no cross-session lock exists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use retrieval::{Modality, Query, RankedCandidate, RetrievalError};

/// Immutable rendered-bundle snapshot kept with a turn.
///
/// Returned bundles stay valid even after the session is pruned; this is a
/// copy the session owns, not a live reference.
#[derive(Clone, Debug)]
pub struct StoredBundle {
    /// Citation-tagged bundle text.
    pub text: String,
    /// Results that ranked but did not fit the character budget.
    pub omitted: usize,
    /// Modalities actually represented in the bundle.
    pub modalities: Vec<Modality>,
    /// Number of citation blocks included.
    pub citations: usize,
}

/// One turn of a session: the query, the full fused candidate set, and the
/// bundle rendered for the served page.
#[derive(Clone, Debug)]
pub struct TurnSnapshot {
    /// Strictly monotonically increasing per session, starting at 1.
    pub number: u64,
    pub query: Query,
    pub candidates: Vec<RankedCandidate>,
    /// Artifact ids actually returned to the caller this turn, in rank
    /// order. Cross-turn dedup excludes these, not the whole snapshot.
    pub served_ids: Vec<String>,
    /// Whether any modality was degraded when the snapshot was built.
    pub partial: bool,
    pub bundle: Option<StoredBundle>,
}

/// Per-session state. Mutated only through the owning [`SessionStore`].
#[derive(Debug)]
pub struct Session {
    pub id: String,
    turn_counter: u64,
    turns: Vec<TurnSnapshot>,
    last_seen: Instant,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            turn_counter: 0,
            turns: Vec::new(),
            last_seen: Instant::now(),
        }
    }

    /// Appends a turn, assigning the next turn number and resetting the
    /// idle-TTL clock. The number is assigned under the session lock, so two
    /// concurrent calls can never share one.
    pub fn record_turn(
        &mut self,
        query: Query,
        candidates: Vec<RankedCandidate>,
        served_ids: Vec<String>,
        partial: bool,
        bundle: Option<StoredBundle>,
    ) -> u64 {
        self.turn_counter += 1;
        let number = self.turn_counter;
        self.turns.push(TurnSnapshot {
            number,
            query,
            candidates,
            served_ids,
            partial,
            bundle,
        });
        self.last_seen = Instant::now();
        debug!(target: "session_store", session = %self.id, turn = number, "turn recorded");
        number
    }

    pub fn turn(&self, number: u64) -> Option<&TurnSnapshot> {
        self.turns.iter().find(|t| t.number == number)
    }

    pub fn last_turn(&self) -> Option<&TurnSnapshot> {
        self.turns.last()
    }

    /// Artifact ids returned to the caller in any prior turn, for
    /// cross-turn dedup.
    pub fn seen_artifacts(&self) -> HashSet<String> {
        self.turns
            .iter()
            .flat_map(|t| t.served_ids.iter().cloned())
            .collect()
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl
    }
}

/// Owning manager for all sessions. The only shared mutable state in the
/// retrieval core.
pub struct SessionStore {
    inner: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a fresh session with a generated id.
    pub async fn create(&self) -> Arc<Mutex<Session>> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(Session::new(id.clone())));
        self.inner.write().await.insert(id.clone(), session.clone());
        debug!(target: "session_store", session = %id, "session created");
        session
    }

    /// Looks up an existing session.
    ///
    /// # Errors
    /// - [`RetrievalError::SessionNotFound`] for ids this store has never
    ///   seen or has already swept;
    /// - [`RetrievalError::SessionExpired`] for sessions past their idle
    ///   TTL. An expired session is never silently recreated: silently
    ///   handing back a new session would mask client-side cursor bugs.
    pub async fn get(&self, id: &str) -> Result<Arc<Mutex<Session>>, RetrievalError> {
        let session = {
            let map = self.inner.read().await;
            map.get(id).cloned()
        };
        let session = session.ok_or_else(|| RetrievalError::SessionNotFound(id.to_string()))?;

        let expired = session.lock().await.expired(self.ttl);
        if expired {
            return Err(RetrievalError::SessionExpired(id.to_string()));
        }
        Ok(session)
    }

    /// Removes every expired session; returns the number collected.
    ///
    /// Sweeping is garbage collection, not an API action: callers do not
    /// delete sessions in the common case.
    pub async fn sweep(&self) -> usize {
        let mut map = self.inner.write().await;
        let mut dead = Vec::new();
        for (id, session) in map.iter() {
            if let Ok(guard) = session.try_lock() {
                if guard.expired(self.ttl) {
                    dead.push(id.clone());
                }
            }
        }
        for id in &dead {
            map.remove(id);
        }
        if !dead.is_empty() {
            info!(target: "session_store", collected = dead.len(), "swept expired sessions");
        }
        dead.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieval::QueryFilters;

    fn query() -> Query {
        Query {
            text: Some("sunset over water".into()),
            reference_artifact_id: None,
            modalities: vec![Modality::Text],
            filters: QueryFilters::default(),
            limit: 5,
            offset: 0,
            dedup_across_turns: false,
        }
    }

    fn candidate(id: &str) -> RankedCandidate {
        RankedCandidate {
            artifact_id: id.into(),
            modalities: vec![Modality::Text],
            score: 0.5,
            local_rank: 0,
        }
    }

    #[tokio::test]
    async fn turn_numbers_are_strictly_monotonic() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create().await;
        let mut guard = session.lock().await;
        let t1 = guard.record_turn(query(), vec![candidate("a")], vec!["a".into()], false, None);
        let t2 = guard.record_turn(query(), vec![candidate("b")], vec!["b".into()], false, None);
        assert_eq!((t1, t2), (1, 2));
        assert!(guard.turn(1).is_some());
        assert!(guard.turn(3).is_none());
    }

    #[tokio::test]
    async fn concurrent_turns_never_share_a_number() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create().await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session
                    .lock()
                    .await
                    .record_turn(query(), vec![], vec![], false, None)
            }));
        }
        let mut numbers = Vec::new();
        for h in handles {
            numbers.push(h.await.unwrap());
        }
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), 16);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = SessionStore::new(Duration::from_secs(60));
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, RetrievalError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn idle_session_expires_and_is_not_recreated() {
        let store = SessionStore::new(Duration::from_millis(20));
        let session = store.create().await;
        let id = session.lock().await.id.clone();

        // Within TTL the session is reachable.
        assert!(store.get(&id).await.is_ok());

        std::thread::sleep(Duration::from_millis(40));
        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, RetrievalError::SessionExpired(_)));

        // Sweep collects it; afterwards the id is simply unknown.
        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 0);
        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, RetrievalError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn recording_a_turn_resets_the_ttl_clock() {
        let store = SessionStore::new(Duration::from_millis(50));
        let session = store.create().await;
        let id = session.lock().await.id.clone();

        std::thread::sleep(Duration::from_millis(30));
        session
            .lock()
            .await
            .record_turn(query(), vec![], vec![], false, None);
        std::thread::sleep(Duration::from_millis(30));

        // 60ms since creation but only 30ms since the last turn.
        assert!(store.get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn seen_artifacts_spans_all_turns() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create().await;
        let mut guard = session.lock().await;
        guard.record_turn(
            query(),
            vec![candidate("a"), candidate("b")],
            vec!["a".into(), "b".into()],
            false,
            None,
        );
        guard.record_turn(
            query(),
            vec![candidate("b"), candidate("c")],
            vec!["b".into(), "c".into()],
            true,
            None,
        );
        let seen = guard.seen_artifacts();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains("c"));
    }
}
