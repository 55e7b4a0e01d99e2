use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    configuration::RemoteEmbeddingSettings,
    domain::entities::embedding_record::Embedding,
    ports::embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
};

/// Embeddings computed by an OpenAI-compatible API (`POST /v1/embeddings`)
pub struct EmbeddingApiRepository {
    client: reqwest::Client,
    endpoint: String,
    api_key: Secret<String>,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    /// Shortens the returned vectors, so they fit the store column
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Embedding,
    index: usize,
}

impl EmbeddingApiRepository {
    pub fn try_new(
        settings: &RemoteEmbeddingSettings,
        model: &str,
        dimension: usize,
    ) -> Result<Self, EmbeddingProviderError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingApiRepository {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[tracing::instrument(
        name = "Creating embedding with the embeddings API",
        skip(self, text),
        fields(model = %self.model, text_length = text.len())
    )]
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: text,
                dimensions: self.dimension,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let EmbeddingsResponse { data } = response.json().await?;
        let embedding = data
            .into_iter()
            .find(|data| data.index == 0)
            .map(|data| data.embedding)
            .ok_or(EmbeddingProviderError::EmptyResponse)?;

        debug!(dimension = embedding.len(), "Received embedding");
        Ok(embedding)
    }
}
