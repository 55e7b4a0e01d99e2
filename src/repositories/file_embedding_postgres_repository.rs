use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgExecutor, PgPool};
use tracing::{error, info};

use crate::{
    domain::entities::file_record::FileRecord,
    ports::file_ingestion_store::{FileIngestionStore, FileIngestionStoreError, UpsertOperation},
};

/// Files metadata and embeddings persisted in Postgres (`pgvector` extension).
///
/// Writes are upserts keyed on `merge_files.id` and `file_embeddings (file_id, section)`,
/// so delivering the same event twice converges to the same rows.
pub struct FileEmbeddingPostgresRepository {
    connection_pool: PgPool,
    /// Declared width of `file_embeddings.embedding`
    embedding_dimension: usize,
}

impl FileEmbeddingPostgresRepository {
    pub fn new(connection_pool: PgPool, embedding_dimension: usize) -> Self {
        Self {
            connection_pool,
            embedding_dimension,
        }
    }

    /// Full-row replacement: every non-key column takes the incoming value, even when null
    #[tracing::instrument(name = "Upserting file in database", skip(self, db_executor, file), fields(file_id = %file.id))]
    pub async fn upsert_file(
        &self,
        db_executor: impl PgExecutor<'_>,
        file: &FileRecord,
    ) -> Result<(), FileIngestionStoreError> {
        sqlx::query(
            r#"
    INSERT INTO merge_files (
        id, remote_id, created_at, modified_at, name,
        file_url, file_thumbnail_url, size, mime_type, description,
        remote_created_at, remote_updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (id) DO UPDATE SET
        remote_id = EXCLUDED.remote_id,
        created_at = EXCLUDED.created_at,
        modified_at = EXCLUDED.modified_at,
        name = EXCLUDED.name,
        file_url = EXCLUDED.file_url,
        file_thumbnail_url = EXCLUDED.file_thumbnail_url,
        size = EXCLUDED.size,
        mime_type = EXCLUDED.mime_type,
        description = EXCLUDED.description,
        remote_created_at = EXCLUDED.remote_created_at,
        remote_updated_at = EXCLUDED.remote_updated_at
            "#,
        )
        .bind(&file.id)
        .bind(&file.remote_id)
        .bind(file.created_at)
        .bind(file.modified_at)
        .bind(&file.name)
        .bind(&file.file_url)
        .bind(&file.file_thumbnail_url)
        .bind(file.size)
        .bind(&file.mime_type)
        .bind(&file.description)
        .bind(file.remote_created_at)
        .bind(file.remote_updated_at)
        .execute(db_executor)
        .await
        .map_err(FileIngestionStoreError::PersistenceError)?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Upserting file embedding in database",
        skip(self, db_executor, text_content, embedding),
        fields(dimension = embedding.len())
    )]
    pub async fn upsert_embedding(
        &self,
        db_executor: impl PgExecutor<'_>,
        file_id: &str,
        section: &str,
        text_content: &str,
        embedding: &[f32],
    ) -> Result<(), FileIngestionStoreError> {
        sqlx::query(
            r#"
    INSERT INTO file_embeddings (file_id, section, text_content, embedding)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (file_id, section) DO UPDATE SET
        text_content = EXCLUDED.text_content,
        embedding = EXCLUDED.embedding
            "#,
        )
        .bind(file_id)
        .bind(section)
        .bind(text_content)
        .bind(Vector::from(embedding.to_vec()))
        .execute(db_executor)
        .await
        .map_err(FileIngestionStoreError::PersistenceError)?;

        Ok(())
    }

    /// Rejects the whole batch if one of its embeddings does not fit the column
    fn check_dimensions(&self, operations: &[UpsertOperation]) -> Result<(), FileIngestionStoreError> {
        for operation in operations {
            if let UpsertOperation::Embedding(record) = operation {
                if record.dimension() != self.embedding_dimension {
                    return Err(FileIngestionStoreError::DimensionMismatch {
                        file_id: record.file_id.clone(),
                        section: record.section.clone(),
                        expected: self.embedding_dimension,
                        actual: record.dimension(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FileIngestionStore for FileEmbeddingPostgresRepository {
    /// Runs the operations in order inside one transaction.
    ///
    /// The transaction is rolled back on the first failing operation.
    #[tracing::instrument(
        name = "Committing upsert batch",
        skip(self, operations),
        fields(nb_operations = operations.len())
    )]
    async fn commit_batch(
        &self,
        operations: &[UpsertOperation],
    ) -> Result<(), FileIngestionStoreError> {
        self.check_dimensions(operations)?;

        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(FileIngestionStoreError::ConnectionError)?;

        for operation in operations {
            let result = match operation {
                UpsertOperation::File(file) => self.upsert_file(&mut *transaction, file).await,
                UpsertOperation::Embedding(record) => {
                    self.upsert_embedding(
                        &mut *transaction,
                        &record.file_id,
                        &record.section,
                        &record.text_content,
                        &record.embedding,
                    )
                    .await
                }
            };

            if let Err(error) = result {
                error!(?error, "Upsert failed, rolling back the batch");
                if let Err(rollback_error) = transaction.rollback().await {
                    // The connection is dropped anyway, Postgres discards the transaction
                    error!(?rollback_error, "Failed to roll back the batch");
                }
                return Err(error);
            }
        }

        transaction
            .commit()
            .await
            .map_err(FileIngestionStoreError::PersistenceError)?;

        info!("Upsert batch committed");
        Ok(())
    }
}
