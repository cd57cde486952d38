//! Runtime configuration for the retrieval pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::RetrievalError;
use crate::types::Modality;

/// Hard cap on the per-request result limit.
pub const MAX_LIMIT: usize = 100;

/// Configuration for cross-modal retrieval and bundling.
#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Qdrant HTTP endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Per-modality collection names.
    pub collections: BTreeMap<Modality, String>,
    /// Candidate multiplier applied to `limit` per collection; covers
    /// dedup and filtering losses and feeds pagination snapshots.
    pub over_fetch_factor: usize,
    /// Deadline for one embedding call.
    pub embed_timeout: Duration,
    /// Deadline for one per-collection search call.
    pub search_timeout: Duration,
    /// Deadline for one artifact resolution call.
    pub resolve_timeout: Duration,
    /// Per-modality fusion weights; missing entries default to 1.0.
    pub modality_weights: BTreeMap<Modality, f32>,
    /// Optional floor on the weighted normalized score.
    pub score_floor: Option<f32>,
    /// Hard character budget for the rendered context bundle.
    pub bundle_max_chars: usize,
    /// Idle TTL after which a session expires.
    pub session_ttl: Duration,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
}

impl RetrievalConfig {
    /// Creates a sane default config for a given Qdrant endpoint.
    ///
    /// Collections default to `artifacts_<modality>`.
    pub fn new_default(url: impl Into<String>) -> Self {
        let collections = Modality::ALL
            .iter()
            .map(|m| (*m, format!("artifacts_{m}")))
            .collect();
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collections,
            over_fetch_factor: 3,
            embed_timeout: Duration::from_secs(3),
            search_timeout: Duration::from_secs(3),
            resolve_timeout: Duration::from_secs(2),
            modality_weights: BTreeMap::new(),
            score_floor: None,
            bundle_max_chars: 8_000,
            session_ttl: Duration::from_secs(1_800),
            exact_search: false,
        }
    }

    /// Build from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::new_default(env("QDRANT_URL", "http://127.0.0.1:6334"));
        cfg.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok();

        for m in Modality::ALL {
            let key = format!("COLLECTION_{}", m.as_str().to_uppercase());
            if let Ok(name) = std::env::var(&key) {
                cfg.collections.insert(m, name);
            }
            let wkey = format!("WEIGHT_{}", m.as_str().to_uppercase());
            if let Some(w) = std::env::var(&wkey).ok().and_then(|v| v.parse().ok()) {
                cfg.modality_weights.insert(m, w);
            }
        }

        cfg.over_fetch_factor = parse("OVER_FETCH_FACTOR", cfg.over_fetch_factor);
        cfg.embed_timeout = Duration::from_millis(parse("EMBED_TIMEOUT_MS", 3_000));
        cfg.search_timeout = Duration::from_millis(parse("SEARCH_TIMEOUT_MS", 3_000));
        cfg.resolve_timeout = Duration::from_millis(parse("RESOLVE_TIMEOUT_MS", 2_000));
        cfg.score_floor = std::env::var("SCORE_FLOOR").ok().and_then(|v| v.parse().ok());
        cfg.bundle_max_chars = parse("BUNDLE_MAX_CHARS", cfg.bundle_max_chars);
        cfg.session_ttl = Duration::from_secs(parse("SESSION_TTL_SECS", 1_800));
        cfg.exact_search = env("EXACT_SEARCH", "false") == "true";
        cfg
    }

    /// Effective fusion weight for a modality (1.0 when unset).
    pub fn weight_for(&self, m: Modality) -> f32 {
        self.modality_weights.get(&m).copied().unwrap_or(1.0)
    }

    /// Candidate count requested from each collection for a given limit.
    pub fn over_fetch(&self, limit: usize) -> u64 {
        limit.saturating_mul(self.over_fetch_factor.max(1)) as u64
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RetrievalError::Config("qdrant_url is empty".into()));
        }
        for (m, name) in &self.collections {
            if name.trim().is_empty() {
                return Err(RetrievalError::Config(format!("collection for {m} is empty")));
            }
        }
        if self.over_fetch_factor == 0 {
            return Err(RetrievalError::Config("over_fetch_factor must be > 0".into()));
        }
        if self.bundle_max_chars == 0 {
            return Err(RetrievalError::Config("bundle_max_chars must be > 0".into()));
        }
        if let Some((m, w)) = self
            .modality_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(RetrievalError::Config(format!("weight for {m} is invalid: {w}")));
        }
        Ok(())
    }
}

fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(dflt)
}
