//! HTTP embedding provider backed by the processing service.
//!
//! The collaborator exposes `POST {endpoint}/embed` and routes the call to a
//! text or multimodal model depending on the requested modality; this client
//! only picks the model name and checks the returned dimensionality.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::{EmbedInput, EmbeddingsProvider};
use crate::errors::RetrievalError;
use crate::types::Modality;

/// Configuration for the HTTP embedding backend.
#[derive(Clone, Debug)]
pub struct EmbedServiceConfig {
    /// Processing-service endpoint, e.g. `http://127.0.0.1:9090`.
    pub endpoint: String,
    /// Model used for text and video-transcript spaces.
    pub text_model: String,
    /// Multimodal (CLIP-style) model used for the image space.
    pub image_model: String,
    /// Expected embedding dimension size.
    pub dim: usize,
}

impl EmbedServiceConfig {
    /// Build from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let env = |k: &str, d: &str| std::env::var(k).unwrap_or_else(|_| d.to_string());
        Self {
            endpoint: env("EMBED_SERVICE_URL", "http://127.0.0.1:9090"),
            text_model: env("EMBED_MODEL_TEXT", "nomic-embed-text"),
            image_model: env("EMBED_MODEL_IMAGE", "clip-vit-b32"),
            dim: env("EMBEDDING_DIM", "768").parse().unwrap_or(768),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    modality: &'a str,
    input: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP embedding provider (async).
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    cfg: EmbedServiceConfig,
    url: String,
}

impl HttpEmbedder {
    /// Construct a new embedder from configuration.
    pub fn new(cfg: EmbedServiceConfig) -> Self {
        let url = format!("{}/embed", cfg.endpoint.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            cfg,
            url,
        }
    }

    fn model_for(&self, modality: Modality) -> &str {
        match modality {
            Modality::Image => &self.cfg.image_model,
            Modality::Text | Modality::Video => &self.cfg.text_model,
        }
    }
}

impl EmbeddingsProvider for HttpEmbedder {
    fn embed<'a>(
        &'a self,
        input: EmbedInput<'a>,
        modality: Modality,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RetrievalError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let input_type = match input {
                EmbedInput::Text(_) => "text",
                EmbedInput::Reference(_) => "reference",
            };
            let body = EmbedRequest {
                model: self.model_for(modality),
                modality: modality.as_str(),
                input: input.as_str(),
                input_type,
            };

            debug!(
                target: "retrieval::embed",
                modality = %modality,
                input_type,
                "requesting embedding"
            );

            let resp = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<EmbedResponse>()
                .await?;

            if resp.embedding.len() != self.cfg.dim {
                return Err(RetrievalError::VectorSizeMismatch {
                    got: resp.embedding.len(),
                    want: self.cfg.dim,
                });
            }

            Ok(resp.embedding)
        })
    }
}
