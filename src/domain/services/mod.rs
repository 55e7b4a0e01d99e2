#[cfg(feature = "local-embeddings")]
pub mod sentence_embedding;
