//! Artifact resolver boundary.
//!
//! The object-storage collaborator owns artifact metadata and stable links;
//! this module defines the consumed contract and an HTTP implementation.
//! Resolution runs only after ranking and truncation, so discarded
//! candidates never cost a call. A missing artifact drops that single
//! result; content may have been deleted after indexing.

use std::{future::Future, pin::Pin};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::RetrievalError;
use crate::types::ArtifactMetadata;

/// Metadata lookup boundary. `Ok(None)` means the artifact no longer exists.
pub trait ArtifactResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        artifact_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ArtifactMetadata>, RetrievalError>> + Send + 'a>>;
}

/// Configuration for the HTTP artifact resolver.
#[derive(Clone, Debug)]
pub struct ArtifactServiceConfig {
    /// Artifact-service endpoint, e.g. `http://127.0.0.1:9091`.
    pub endpoint: String,
}

impl ArtifactServiceConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("ARTIFACT_SERVICE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9091".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ArtifactResponse {
    title: String,
    excerpt: String,
    kind: String,
    link: String,
}

/// HTTP artifact resolver (async).
#[derive(Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base: String,
}

impl HttpResolver {
    pub fn new(cfg: ArtifactServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("{}/artifacts", cfg.endpoint.trim_end_matches('/')),
        }
    }
}

impl ArtifactResolver for HttpResolver {
    fn resolve<'a>(
        &'a self,
        artifact_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ArtifactMetadata>, RetrievalError>> + Send + 'a>>
    {
        Box::pin(async move {
            let url = format!("{}/{artifact_id}", self.base);
            let resp = self.client.get(&url).send().await?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                warn!(
                    target: "retrieval::resolve",
                    artifact_id,
                    "artifact vanished after indexing"
                );
                return Ok(None);
            }

            let meta = resp.error_for_status()?.json::<ArtifactResponse>().await?;
            debug!(target: "retrieval::resolve", artifact_id, kind = %meta.kind, "resolved");
            Ok(Some(ArtifactMetadata {
                title: meta.title,
                excerpt: meta.excerpt,
                kind: meta.kind,
                link: meta.link,
            }))
        })
    }
}
