//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind a minimal API,
//! hiding away the verbose builder pattern and keeping the rest of the
//! application decoupled from `qdrant-client`. Each modality maps to its own
//! independently indexed collection; the index itself is a black box that
//! answers k-NN queries.

use std::{future::Future, pin::Pin};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, FieldCondition, Filter, Match, Range, SearchParamsBuilder, SearchPointsBuilder,
    Value as QValue, condition::ConditionOneOf,
};
use tracing::{debug, trace};

use crate::config::RetrievalConfig;
use crate::errors::RetrievalError;
use crate::types::{Modality, QueryFilters, RawHit};

/// k-NN search boundary over per-modality collections.
///
/// The production implementation is [`QdrantFacade`]; tests substitute an
/// in-memory backend.
pub trait VectorSearcher: Send + Sync {
    /// Runs a k-NN query against the given modality's collection and returns
    /// hits in the backend's score order.
    fn knn<'a>(
        &'a self,
        modality: Modality,
        vector: Vec<f32>,
        top_k: u64,
        filters: &'a QueryFilters,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawHit>, RetrievalError>> + Send + 'a>>;
}

/// A facade over the Qdrant client to keep the rest of the code clean and
/// stable.
pub struct QdrantFacade {
    client: Qdrant,
    cfg: RetrievalConfig,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// Uses the modern builder-based API of `qdrant-client` and supports
    /// optional API key authentication.
    pub fn new(cfg: &RetrievalConfig) -> Result<Self, RetrievalError> {
        cfg.validate()?; // Early validation of config.

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RetrievalError::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            cfg: cfg.clone(),
        })
    }

    fn collection_for(&self, modality: Modality) -> Result<&str, RetrievalError> {
        self.cfg
            .collections
            .get(&modality)
            .map(String::as_str)
            .ok_or_else(|| RetrievalError::Config(format!("no collection configured for {modality}")))
    }
}

impl VectorSearcher for QdrantFacade {
    fn knn<'a>(
        &'a self,
        modality: Modality,
        vector: Vec<f32>,
        top_k: u64,
        filters: &'a QueryFilters,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawHit>, RetrievalError>> + Send + 'a>> {
        Box::pin(async move {
            let collection = self.collection_for(modality)?;
            trace!(
                target: "retrieval::qdrant",
                %modality,
                collection,
                top_k,
                "knn search"
            );

            let mut builder =
                SearchPointsBuilder::new(collection, vector, top_k).with_payload(true);
            if !filters.is_empty() {
                builder = builder.filter(to_qdrant_filter(filters));
            }
            if self.cfg.exact_search {
                builder = builder.params(SearchParamsBuilder::default().exact(true));
            }

            let res = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| RetrievalError::Qdrant(e.to_string()))?;

            let mut out = Vec::with_capacity(res.result.len());
            for (local_rank, point) in res.result.into_iter().enumerate() {
                let Some(artifact_id) = payload_artifact_id(&point.payload) else {
                    // Indexed point without an artifact id cannot be resolved
                    // or cited; skip it.
                    continue;
                };
                out.push(RawHit {
                    artifact_id,
                    modality,
                    score: point.score,
                    local_rank,
                });
            }

            debug!(
                target: "retrieval::qdrant",
                %modality,
                hits = out.len(),
                "knn search completed"
            );
            Ok(out)
        })
    }
}

/// Converts typed [`QueryFilters`] to a Qdrant [`Filter`].
///
/// Equality supports `String` → `Keyword`, integer `Number` → `Integer`,
/// `Bool` → `Boolean`; ranges map to Qdrant `Range` bounds. All constraints
/// are combined with AND (`must`).
fn to_qdrant_filter(f: &QueryFilters) -> Filter {
    let mut must: Vec<Condition> = Vec::new();

    for (field, val) in &f.equals {
        let m = match val {
            serde_json::Value::String(s) => Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(s.clone())),
            },
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Match {
                        match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Integer(i)),
                    }
                } else {
                    continue;
                }
            }
            serde_json::Value::Bool(b) => Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Boolean(*b)),
            },
            _ => continue, // skip unsupported types
        };
        must.push(Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: field.clone(),
                r#match: Some(m),
                ..Default::default()
            })),
        });
    }

    for (field, range) in &f.ranges {
        must.push(Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: field.clone(),
                range: Some(Range {
                    gte: range.min,
                    lte: range.max,
                    ..Default::default()
                }),
                ..Default::default()
            })),
        });
    }

    Filter {
        must,
        ..Default::default()
    }
}

/// Extracts the `artifact_id` payload field.
fn payload_artifact_id(payload: &std::collections::HashMap<String, QValue>) -> Option<String> {
    use qdrant_client::qdrant::value::Kind as K;
    match payload.get("artifact_id").and_then(|v| v.kind.as_ref()) {
        Some(K::StringValue(s)) => Some(s.clone()),
        Some(K::IntegerValue(i)) => Some(i.to_string()),
        _ => None,
    }
}
