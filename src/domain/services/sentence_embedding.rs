use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModelType,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::{
    domain::entities::embedding_record::Embedding,
    ports::embedding_provider::{EmbeddingProvider, EmbeddingProviderError},
};

/// Maximum number of texts waiting for the model
const RUNNER_QUEUE_SIZE: usize = 100;

/// Embeddings computed by a sentence-embedding model from Hugging Face, inside the process.
///
/// The model is heavy and its inference is CPU bound, so it lives on a dedicated thread
/// (the runner) fed through a channel. The runner is only spawned, and the model only
/// downloaded and loaded, on the first call to `embed`: building the provider is cheap.
///
/// Dropping the provider closes the channel and waits for the runner thread to exit.
#[derive(Debug)]
pub struct SentenceEmbeddingProvider {
    model_type: SentenceEmbeddingsModelType,
    dimension: usize,
    runner: OnceCell<Runner>,
}

#[derive(Debug)]
struct Runner {
    sender: mpsc::Sender<RunnerMessage>,
    handle: JoinHandle<()>,
}

/// Text to embed, and where to send its embedding
type RunnerMessage = (String, oneshot::Sender<Result<Embedding, String>>);

impl SentenceEmbeddingProvider {
    /// Resolves a model name of the configuration, for ex `all-MiniLM-L6-v2`
    pub fn try_new(model_name: &str) -> Result<Self, EmbeddingProviderError> {
        let (model_type, dimension) = match model_name {
            "all-MiniLM-L6-v2" => (SentenceEmbeddingsModelType::AllMiniLmL6V2, 384),
            "all-MiniLM-L12-v2" => (SentenceEmbeddingsModelType::AllMiniLmL12V2, 384),
            "all-distilroberta-v1" => (SentenceEmbeddingsModelType::AllDistilrobertaV1, 768),
            other => {
                return Err(EmbeddingProviderError::ModelError(format!(
                    "Unsupported sentence embeddings model: {}",
                    other
                )))
            }
        };

        Ok(Self {
            model_type,
            dimension,
            runner: OnceCell::new(),
        })
    }

    fn spawn_runner(&self) -> Result<Runner, EmbeddingProviderError> {
        let (sender, receiver) = mpsc::channel(RUNNER_QUEUE_SIZE);
        let model_type = self.model_type.clone();

        let handle = thread::Builder::new()
            .name("sentence-embeddings".into())
            .spawn(move || run(model_type, receiver))
            .map_err(|e| EmbeddingProviderError::RunnerUnavailable(e.to_string()))?;

        Ok(Runner { sender, handle })
    }
}

impl Drop for SentenceEmbeddingProvider {
    /// Closes the channel and blocks until the runner thread exited.
    ///
    /// Texts already queued are still embedded before the thread stops.
    fn drop(&mut self) {
        if let Some(Runner { sender, handle }) = self.runner.take() {
            drop(sender);
            if handle.join().is_err() {
                error!("Embeddings runner thread panicked");
            }
        }
    }
}

/// The runner itself, on its own thread.
///
/// If the model cannot be loaded, every request receives the loading error.
fn run(model_type: SentenceEmbeddingsModelType, mut receiver: mpsc::Receiver<RunnerMessage>) {
    let model = match SentenceEmbeddingsBuilder::remote(model_type).create_model() {
        Ok(model) => {
            info!("Embeddings model loaded");
            model
        }
        Err(error) => {
            error!(?error, "Failed to load the embeddings model");
            let message = error.to_string();
            while let Some((_, reply)) = receiver.blocking_recv() {
                let _ = reply.send(Err(message.clone()));
            }
            return;
        }
    };

    while let Some((text, reply)) = receiver.blocking_recv() {
        let result = model
            .encode(&[text.as_str()])
            .map_err(|e| e.to_string())
            .and_then(|embeddings| {
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| "The model returned no embedding".to_string())
            });

        if reply.send(result).is_err() {
            debug!("Embedding requester went away before the result");
        }
    }

    info!("Embeddings runner stopped");
}

#[async_trait]
impl EmbeddingProvider for SentenceEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[tracing::instrument(
        name = "Creating embedding with the sentence embeddings model",
        skip(self, text),
        fields(text_length = text.len())
    )]
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let runner = self.runner.get_or_try_init(|| self.spawn_runner())?;

        let (sender, receiver) = oneshot::channel();
        runner
            .sender
            .send((text.to_string(), sender))
            .await
            .map_err(|_| EmbeddingProviderError::RunnerUnavailable("runner stopped".into()))?;

        receiver
            .await
            .map_err(|e| EmbeddingProviderError::RunnerUnavailable(e.to_string()))?
            .map_err(EmbeddingProviderError::ModelError)
    }
}
