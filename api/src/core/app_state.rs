//! Shared application state handed to every route.

use std::sync::Arc;

use bundler::SearchEngine;
use retrieval::{
    ArtifactServiceConfig, HttpResolver, QdrantFacade, RetrievalConfig,
    embed::http::{EmbedServiceConfig, HttpEmbedder},
};
use session_store::SessionStore;

use crate::error_handler::AppError;

/// Wires the engine and session store once at startup.
pub struct AppState {
    pub engine: SearchEngine,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Builds production state from environment configuration.
    pub fn from_env() -> Result<Arc<AppState>, AppError> {
        let cfg = RetrievalConfig::from_env();
        let sessions = Arc::new(SessionStore::new(cfg.session_ttl));

        let facade = QdrantFacade::new(&cfg)?;
        let embedder = HttpEmbedder::new(EmbedServiceConfig::from_env());
        let resolver = HttpResolver::new(ArtifactServiceConfig::from_env());

        let engine = SearchEngine::new(
            cfg,
            Arc::new(embedder),
            Arc::new(facade),
            Arc::new(resolver),
            sessions.clone(),
        );

        Ok(Arc::new(AppState { engine, sessions }))
    }
}
