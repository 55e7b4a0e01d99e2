use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, info};

use crate::{
    configuration::MergeSettings,
    ports::file_source::{FileSource, FileSourceError},
};

/// Merge file storage API client, downloading the files of one linked account
#[derive(Debug)]
pub struct FileSourceMergeRepository {
    client: reqwest::Client,
    base_url: Url,
    api_key: Secret<String>,
    account_token: Secret<String>,
}

impl FileSourceMergeRepository {
    pub fn try_new(settings: &MergeSettings) -> Result<Self, FileSourceError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| FileSourceError::InvalidBaseUrl(format!("{}: {}", settings.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FileSourceError::InvalidBaseUrl(settings.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            account_token: settings.account_token.clone(),
        })
    }

    /// `{base_url}/api/filestorage/v1/files/{file_id}/download`
    ///
    /// The id is pushed as a single path segment, so it is percent-encoded if needed.
    fn download_url(&self, file_id: &str) -> Result<Url, FileSourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FileSourceError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "filestorage", "v1", "files", file_id, "download"]);

        Ok(url)
    }
}

#[async_trait]
impl FileSource for FileSourceMergeRepository {
    /// Asks Merge for a plain text export of the file and reads the streamed body chunk by chunk.
    ///
    /// Chunks are joined before decoding, a multi-byte character can be split between two chunks.
    #[tracing::instrument(name = "Downloading file content from Merge", skip(self))]
    async fn download_text(&self, file_id: &str) -> Result<String, FileSourceError> {
        let response = self
            .client
            .get(self.download_url(file_id)?)
            .query(&[("mime_type", "txt")])
            .bearer_auth(self.api_key.expose_secret())
            .header("X-Account-Token", self.account_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FileSourceError::ApiError {
                file_id: file_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let mut content = Vec::<u8>::new();
        let mut nb_chunks = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
            nb_chunks += 1;
        }
        debug!(nb_chunks, "Received file chunks");

        let text = String::from_utf8(content)?;
        info!(nb_bytes = text.len(), "Downloaded file content");

        Ok(text)
    }
}
