/// A dense vector representing a text
pub type Embedding = Vec<f32>;

/// Label of the section covering the whole text of a file.
///
/// Files are not chunked: each file gets exactly one embedding, under this section.
pub const CONTENT_SECTION: &str = "content";

/// Embedding of one section of a file's text.
///
/// At most one record exists per (`file_id`, `section`).
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub file_id: String,
    pub section: String,
    /// The exact text the embedding was computed from
    pub text_content: String,
    pub embedding: Embedding,
}

impl EmbeddingRecord {
    /// Embedding of the whole content of a file
    pub fn content(file_id: impl Into<String>, text_content: String, embedding: Embedding) -> Self {
        Self {
            file_id: file_id.into(),
            section: CONTENT_SECTION.to_string(),
            text_content,
            embedding,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}
