use async_trait::async_trait;

use crate::{
    domain::entities::{embedding_record::EmbeddingRecord, file_record::FileRecord},
    helper::error_chain_fmt,
};

/// One idempotent write of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOperation {
    /// Inserts the file, or replaces every column of the existing row with the same `id`
    File(FileRecord),
    /// Inserts the embedding, or replaces `text_content` and `embedding` of the existing row
    /// with the same (`file_id`, `section`)
    Embedding(EmbeddingRecord),
}

/// Persists files and their embeddings.
///
/// A batch is atomic: after `commit_batch` returns, either every operation is visible or
/// none of them is.
#[async_trait]
pub trait FileIngestionStore: Send + Sync {
    async fn commit_batch(
        &self,
        operations: &[UpsertOperation],
    ) -> Result<(), FileIngestionStoreError>;
}

#[derive(thiserror::Error)]
pub enum FileIngestionStoreError {
    #[error("Failed to acquire a database connection: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error(
        "Embedding of section `{section}` of file {file_id} has {actual} dimensions, the store expects {expected}"
    )]
    DimensionMismatch {
        file_id: String,
        section: String,
        expected: usize,
        actual: usize,
    },

    #[error("Database write failed: {0}")]
    PersistenceError(#[source] sqlx::Error),
}

impl std::fmt::Debug for FileIngestionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
