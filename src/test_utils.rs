//! In-memory stand-ins for the ports, recording how they were called.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::entities::embedding_record::Embedding,
    ports::{
        embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
        file_ingestion_store::{FileIngestionStore, FileIngestionStoreError, UpsertOperation},
        file_source::{FileSource, FileSourceError},
    },
};

pub struct FakeFileSource {
    text: Option<String>,
    requested_ids: Mutex<Vec<String>>,
}

impl FakeFileSource {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            requested_ids: Mutex::default(),
        }
    }

    /// Answers every download with a server error
    pub fn failing() -> Self {
        Self {
            text: None,
            requested_ids: Mutex::default(),
        }
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.requested_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSource for FakeFileSource {
    async fn download_text(&self, file_id: &str) -> Result<String, FileSourceError> {
        self.requested_ids.lock().unwrap().push(file_id.to_string());

        self.text.clone().ok_or_else(|| FileSourceError::ApiError {
            file_id: file_id.to_string(),
            status: 500,
            body: "Internal server error".to_string(),
        })
    }
}

pub struct FakeEmbeddingProvider {
    dimension: usize,
    fail: bool,
    embedded_texts: Mutex<Vec<String>>,
}

impl FakeEmbeddingProvider {
    /// Embeds every text as a vector of ones
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            embedded_texts: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(3)
        }
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded_texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        self.embedded_texts.lock().unwrap().push(text.to_string());

        if self.fail {
            return Err(EmbeddingProviderError::ModelError(
                "model is overloaded".to_string(),
            ));
        }
        Ok(vec![1.0; self.dimension])
    }
}

#[derive(Default)]
pub struct FakeStore {
    unreachable: bool,
    rejecting: bool,
    batches: Mutex<Vec<Vec<UpsertOperation>>>,
}

impl FakeStore {
    /// Fails to acquire a connection
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Connects, but every write fails
    pub fn rejecting() -> Self {
        Self {
            rejecting: true,
            ..Self::default()
        }
    }

    /// Committed batches only
    pub fn batches(&self) -> Vec<Vec<UpsertOperation>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileIngestionStore for FakeStore {
    async fn commit_batch(
        &self,
        operations: &[UpsertOperation],
    ) -> Result<(), FileIngestionStoreError> {
        if self.unreachable {
            return Err(FileIngestionStoreError::ConnectionError(
                sqlx::Error::PoolTimedOut,
            ));
        }
        if self.rejecting {
            return Err(FileIngestionStoreError::PersistenceError(
                sqlx::Error::Protocol("constraint violation".to_string()),
            ));
        }

        self.batches.lock().unwrap().push(operations.to_vec());
        Ok(())
    }
}
