use async_trait::async_trait;

use crate::helper::error_chain_fmt;

/// Gives access to the content of the files of the document storage
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Downloads the whole content of a file as UTF-8 text
    async fn download_text(&self, file_id: &str) -> Result<String, FileSourceError>;
}

#[derive(thiserror::Error)]
pub enum FileSourceError {
    #[error("Invalid file source base url: {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error("File source responded with status {status} for file {file_id}: {body}")]
    ApiError {
        file_id: String,
        status: u16,
        body: String,
    },

    #[error("File content is not valid UTF-8 text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

impl std::fmt::Debug for FileSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
