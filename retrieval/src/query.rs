//! Query normalization: raw request fields into a canonical [`Query`].
//!
//! The normalizer is a pure transform: it validates, canonicalizes and
//! rejects, but never touches a backend. Cursor *parsing* happens here;
//! resolving the cursor against live session state is the pipeline's job.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::MAX_LIMIT;
use crate::errors::RetrievalError;
use crate::types::{Modality, Query, QueryFilters, RangeFilter};

/// Filter keys accepted for exact-equality constraints.
pub const EQUALITY_KEYS: &[&str] = &["source", "kind", "tag"];

/// Filter keys accepted for numeric range constraints.
pub const RANGE_KEYS: &[&str] = &["created_at", "duration_s"];

/// Raw, untrusted search request as it arrives over the wire.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSearchRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub reference_artifact_id: Option<String>,
    #[serde(default)]
    pub modalities: Vec<String>,
    /// Open mapping on the wire; keys are checked against the allow-lists.
    #[serde(default)]
    pub filters: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub dedup_across_turns: bool,
}

/// Parsed continuation cursor: `v1.<session_id>.<turn>.<offset>`.
///
/// Opaque to callers; only this module produces and consumes the format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub session_id: String,
    pub turn: u64,
    pub offset: usize,
}

impl Cursor {
    pub fn encode(&self) -> String {
        format!("v1.{}.{}.{}", self.session_id, self.turn, self.offset)
    }

    /// Parses a cursor token.
    ///
    /// # Errors
    /// Returns [`RetrievalError::InvalidCursor`] on any structural mismatch.
    pub fn parse(token: &str) -> Result<Cursor, RetrievalError> {
        let bad = || RetrievalError::InvalidCursor(token.to_string());
        let mut parts = token.split('.');
        if parts.next() != Some("v1") {
            return Err(bad());
        }
        let session_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(bad)?;
        let turn: u64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
        let offset: usize = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Cursor {
            session_id: session_id.to_string(),
            turn,
            offset,
        })
    }
}

/// Validates a raw request and produces a canonical [`Query`] plus the
/// parsed cursor, if one was supplied.
///
/// # Errors
/// Returns [`RetrievalError::InvalidQuery`] when an invariant is violated and
/// [`RetrievalError::InvalidCursor`] for a malformed cursor token.
pub fn normalize(raw: &RawSearchRequest) -> Result<(Query, Option<Cursor>), RetrievalError> {
    let text = raw
        .query_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let reference = raw
        .reference_artifact_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if text.is_none() && reference.is_none() {
        return Err(RetrievalError::InvalidQuery(
            "one of query_text or reference_artifact_id is required".into(),
        ));
    }

    if raw.modalities.is_empty() {
        return Err(RetrievalError::InvalidQuery("modalities must be non-empty".into()));
    }
    let mut modalities: Vec<Modality> = Vec::new();
    for name in &raw.modalities {
        let m = Modality::parse(name)
            .ok_or_else(|| RetrievalError::InvalidQuery(format!("unknown modality: {name}")))?;
        if !modalities.contains(&m) {
            modalities.push(m);
        }
    }
    modalities.sort();

    let limit = raw.limit.unwrap_or(10);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(RetrievalError::InvalidQuery(format!(
            "limit must be within 1..={MAX_LIMIT}, got {limit}"
        )));
    }

    let filters = match &raw.filters {
        Some(map) => parse_filters(map)?,
        None => QueryFilters::default(),
    };

    let cursor = raw.cursor.as_deref().map(Cursor::parse).transpose()?;
    let offset = cursor.as_ref().map(|c| c.offset).unwrap_or(0);

    debug!(
        target: "retrieval::query",
        modalities = modalities.len(),
        limit,
        offset,
        has_cursor = cursor.is_some(),
        "normalized query"
    );

    Ok((
        Query {
            text,
            reference_artifact_id: reference,
            modalities,
            filters,
            limit,
            offset,
            dedup_across_turns: raw.dedup_across_turns,
        },
        cursor,
    ))
}

/// Converts the open wire mapping into typed filters, rejecting unknown keys
/// and non-scalar equality values.
fn parse_filters(map: &serde_json::Map<String, Value>) -> Result<QueryFilters, RetrievalError> {
    let mut filters = QueryFilters::default();
    for (key, val) in map {
        if EQUALITY_KEYS.contains(&key.as_str()) {
            match val {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    filters.equals.push((key.clone(), val.clone()));
                }
                _ => {
                    return Err(RetrievalError::InvalidQuery(format!(
                        "filter '{key}' must be a scalar value"
                    )));
                }
            }
        } else if RANGE_KEYS.contains(&key.as_str()) {
            let obj = val.as_object().ok_or_else(|| {
                RetrievalError::InvalidQuery(format!("filter '{key}' must be a {{min,max}} object"))
            })?;
            if let Some(unknown) = obj.keys().find(|k| *k != "min" && *k != "max") {
                return Err(RetrievalError::InvalidQuery(format!(
                    "filter '{key}' has unknown bound '{unknown}'"
                )));
            }
            let range = RangeFilter {
                min: obj.get("min").and_then(Value::as_f64),
                max: obj.get("max").and_then(Value::as_f64),
            };
            if range.min.is_none() && range.max.is_none() {
                return Err(RetrievalError::InvalidQuery(format!(
                    "filter '{key}' needs at least one of min/max"
                )));
            }
            filters.ranges.push((key.clone(), range));
        } else {
            return Err(RetrievalError::InvalidQuery(format!("unknown filter key: {key}")));
        }
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawSearchRequest {
        RawSearchRequest {
            query_text: Some("red bicycle".into()),
            modalities: vec!["text".into(), "image".into()],
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_and_sorts_modalities() {
        let mut raw = base_raw();
        raw.modalities = vec!["image".into(), "text".into(), "image".into()];
        let (q, cursor) = normalize(&raw).unwrap();
        assert_eq!(q.modalities, vec![Modality::Text, Modality::Image]);
        assert_eq!(q.limit, 10);
        assert!(cursor.is_none());
    }

    #[test]
    fn rejects_missing_text_and_reference() {
        let mut raw = base_raw();
        raw.query_text = Some("   ".into());
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    }

    #[test]
    fn rejects_empty_modalities_and_unknown_modality() {
        let mut raw = base_raw();
        raw.modalities.clear();
        assert!(matches!(normalize(&raw), Err(RetrievalError::InvalidQuery(_))));

        let mut raw = base_raw();
        raw.modalities = vec!["audio".into()];
        assert!(matches!(normalize(&raw), Err(RetrievalError::InvalidQuery(_))));
    }

    #[test]
    fn rejects_out_of_range_limit() {
        let mut raw = base_raw();
        raw.limit = Some(0);
        assert!(matches!(normalize(&raw), Err(RetrievalError::InvalidQuery(_))));
        raw.limit = Some(MAX_LIMIT + 1);
        assert!(matches!(normalize(&raw), Err(RetrievalError::InvalidQuery(_))));
    }

    #[test]
    fn rejects_unknown_filter_key() {
        let mut raw = base_raw();
        let mut map = serde_json::Map::new();
        map.insert("owner".into(), serde_json::json!("me"));
        raw.filters = Some(map);
        let err = normalize(&raw).unwrap_err();
        assert!(err.to_string().contains("unknown filter key"));
    }

    #[test]
    fn parses_equality_and_range_filters() {
        let mut raw = base_raw();
        let mut map = serde_json::Map::new();
        map.insert("source".into(), serde_json::json!("camera_roll"));
        map.insert("duration_s".into(), serde_json::json!({"min": 10, "max": 60}));
        raw.filters = Some(map);
        let (q, _) = normalize(&raw).unwrap();
        assert_eq!(q.filters.equals.len(), 1);
        assert_eq!(q.filters.ranges.len(), 1);
        assert_eq!(q.filters.ranges[0].1.min, Some(10.0));
    }

    #[test]
    fn cursor_round_trip_and_rejection() {
        let c = Cursor {
            session_id: "2b1c".into(),
            turn: 4,
            offset: 20,
        };
        assert_eq!(Cursor::parse(&c.encode()).unwrap(), c);

        for bad in ["", "v2.a.1.2", "v1..1.2", "v1.a.x.2", "v1.a.1.2.3"] {
            assert!(matches!(
                Cursor::parse(bad),
                Err(RetrievalError::InvalidCursor(_))
            ));
        }
    }

    #[test]
    fn cursor_offset_flows_into_query() {
        let mut raw = base_raw();
        raw.cursor = Some("v1.sess.2.15".into());
        let (q, cursor) = normalize(&raw).unwrap();
        assert_eq!(q.offset, 15);
        assert_eq!(cursor.unwrap().turn, 2);
    }
}
