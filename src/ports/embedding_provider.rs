use async_trait::async_trait;

use crate::{domain::entities::embedding_record::Embedding, helper::error_chain_fmt};

/// Computes the embedding of a text.
///
/// Implementations are built once and shared between requests: they must not keep any
/// per-request state.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Number of values of every embedding returned by `embed`
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError>;
}

#[derive(thiserror::Error)]
pub enum EmbeddingProviderError {
    #[error("Embeddings model error: {0}")]
    ModelError(String),

    #[error("Embeddings model runner is not available: {0}")]
    RunnerUnavailable(String),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error("Embeddings API responded with status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Embeddings API response did not contain any embedding")]
    EmptyResponse,
}

impl std::fmt::Debug for EmbeddingProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
