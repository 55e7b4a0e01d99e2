use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;
use tracing::{error, info};

use crate::{
    domain::entities::file_changed_event::{FileChangedEvent, FileChangedEventError},
    helper::error_chain_fmt,
    ports::{
        embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
        file_ingestion_store::{FileIngestionStore, FileIngestionStoreError},
        file_source::{FileSource, FileSourceError},
    },
    use_cases::ingest_changed_file::{ingest_changed_file, IngestChangedFileError},
};

pub const SUCCESS_MESSAGE: &str = "File data and embedding successfully upserted into the database.";

/// Receives the `File.changed` webhook of Merge.
///
/// The raw body is parsed here rather than with `web::Json`, so a malformed payload gets the
/// same `{error, details}` response as every other failure.
#[tracing::instrument(
    name = "File changed webhook",
    skip(body, file_source, embedding_provider, store)
)]
pub async fn file_changed_webhook(
    body: web::Bytes,
    file_source: web::Data<dyn FileSource>,
    embedding_provider: web::Data<dyn EmbeddingProvider>,
    store: web::Data<dyn FileIngestionStore>,
) -> Result<HttpResponse, FileChangedWebhookError> {
    let event = FileChangedEvent::try_parsing(&body)?;
    info!(
        hook_id = event.hook_id(),
        hook_event = event.hook_event(),
        linked_account_id = event.linked_account_id(),
        integration = event.integration(),
        category = event.category(),
        "Received file changed event"
    );

    let file = event.into_file_record()?;

    ingest_changed_file(
        file_source.get_ref(),
        embedding_provider.get_ref(),
        store.get_ref(),
        file,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": SUCCESS_MESSAGE })))
}

#[derive(thiserror::Error)]
pub enum FileChangedWebhookError {
    #[error("Invalid JSON payload")]
    InvalidPayload(#[source] FileChangedEventError),
    #[error("Invalid field value in the payload.")]
    InvalidFieldValue(#[source] FileChangedEventError),
    #[error("No 'id' field provided in the payload.")]
    MissingFileId(#[source] FileChangedEventError),
    #[error("Failed to download the file content")]
    FileSourceError(#[source] FileSourceError),
    #[error("Failed to create embedding for the text")]
    EmbeddingError(#[source] EmbeddingProviderError),
    #[error("Database connection failed")]
    ConnectionError(#[source] FileIngestionStoreError),
    #[error("Database operation failed")]
    PersistenceError(#[source] FileIngestionStoreError),
}

impl From<FileChangedEventError> for FileChangedWebhookError {
    fn from(error: FileChangedEventError) -> Self {
        match error {
            FileChangedEventError::InvalidJsonData(_) => Self::InvalidPayload(error),
            FileChangedEventError::InvalidFieldValue(_) => Self::InvalidFieldValue(error),
            FileChangedEventError::MissingFileId => Self::MissingFileId(error),
        }
    }
}

impl From<IngestChangedFileError> for FileChangedWebhookError {
    fn from(error: IngestChangedFileError) -> Self {
        match error {
            IngestChangedFileError::FileSourceError(e) => Self::FileSourceError(e),
            IngestChangedFileError::EmbeddingError(e) => Self::EmbeddingError(e),
            IngestChangedFileError::StoreError(e @ FileIngestionStoreError::ConnectionError(_)) => {
                Self::ConnectionError(e)
            }
            IngestChangedFileError::StoreError(e) => Self::PersistenceError(e),
        }
    }
}

impl std::fmt::Debug for FileChangedWebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl FileChangedWebhookError {
    /// Message of the underlying error, returned to the caller to help diagnose the failure
    pub fn details(&self) -> String {
        std::error::Error::source(self)
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

impl ResponseError for FileChangedWebhookError {
    fn status_code(&self) -> StatusCode {
        match self {
            FileChangedWebhookError::InvalidPayload(_)
            | FileChangedWebhookError::InvalidFieldValue(_)
            | FileChangedWebhookError::MissingFileId(_) => StatusCode::BAD_REQUEST,
            FileChangedWebhookError::FileSourceError(_)
            | FileChangedWebhookError::EmbeddingError(_)
            | FileChangedWebhookError::ConnectionError(_)
            | FileChangedWebhookError::PersistenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from file_changed_webhook route", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        if self.status_code().is_server_error() {
            error!(error = ?self, "Failed to ingest changed file");
        } else {
            info!(error = ?self, "Rejected file changed event");
        }

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string(), "details": self.details() }))
    }
}
