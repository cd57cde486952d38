//! Embedding client boundary.
//!
//! Embedding generation is owned by a separate processing service; this
//! module only defines the consumed contract and an HTTP implementation.
//! Async is required because real providers perform HTTP requests.

use std::{future::Future, pin::Pin};

use crate::errors::RetrievalError;
use crate::types::Modality;

pub mod http;

/// What is being embedded: free text or a previously ingested artifact
/// referenced by id (the collaborator looks up its media).
#[derive(Clone, Copy, Debug)]
pub enum EmbedInput<'a> {
    Text(&'a str),
    Reference(&'a str),
}

impl EmbedInput<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            EmbedInput::Text(s) | EmbedInput::Reference(s) => s,
        }
    }
}

/// Provider interface for query embedding, one vector per modality space.
///
/// Implement this trait to plug in your own embedding backend; tests use an
/// in-memory implementation.
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds the input into the given modality's vector space.
    fn embed<'a>(
        &'a self,
        input: EmbedInput<'a>,
        modality: Modality,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RetrievalError>> + Send + 'a>>;
}
