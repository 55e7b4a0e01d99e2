use tracing::info;

use crate::{
    domain::entities::{embedding_record::EmbeddingRecord, file_record::FileRecord},
    helper::error_chain_fmt,
    ports::{
        embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
        file_ingestion_store::{FileIngestionStore, FileIngestionStoreError, UpsertOperation},
        file_source::{FileSource, FileSourceError},
    },
};

/// Downloads the text of a changed file, embeds it, and upserts the file and its embedding.
///
/// Steps run one after the other and stop at the first failure, nothing is retried:
/// the webhook sender is responsible for delivering the event again.
#[tracing::instrument(
    name = "Ingesting changed file",
    skip(file_source, embedding_provider, store, file),
    fields(file_id = %file.id)
)]
pub async fn ingest_changed_file(
    file_source: &dyn FileSource,
    embedding_provider: &dyn EmbeddingProvider,
    store: &dyn FileIngestionStore,
    file: FileRecord,
) -> Result<(), IngestChangedFileError> {
    let text = file_source.download_text(&file.id).await?;

    let embedding = embedding_provider.embed(&text).await?;
    info!(dimension = embedding.len(), "Created embedding");

    let embedding_record = EmbeddingRecord::content(file.id.clone(), text, embedding);

    store
        .commit_batch(&[
            UpsertOperation::File(file),
            UpsertOperation::Embedding(embedding_record),
        ])
        .await?;

    info!("Successfully ingested changed file");
    Ok(())
}

#[derive(thiserror::Error)]
pub enum IngestChangedFileError {
    #[error(transparent)]
    FileSourceError(#[from] FileSourceError),
    #[error(transparent)]
    EmbeddingError(#[from] EmbeddingProviderError),
    #[error(transparent)]
    StoreError(#[from] FileIngestionStoreError),
}

impl std::fmt::Debug for IngestChangedFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
