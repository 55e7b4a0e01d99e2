use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

use crate::{domain::entities::file_record::FileRecord, helper::error_chain_fmt};

/// Webhook payload sent by Merge when a file of a linked account changed.
///
/// Only `data` is used to ingest the file, `hook` and `linked_account` are kept for logs.
/// Fields we do not store (`folder`, `permissions`, `drive` ...) are ignored.
#[derive(Debug, Deserialize)]
pub struct FileChangedEvent {
    pub hook: Option<WebhookHook>,
    pub linked_account: Option<LinkedAccount>,
    pub data: Option<FileChangedData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookHook {
    pub id: Option<String>,
    /// For ex `File.changed`
    pub event: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkedAccount {
    pub id: Option<String>,
    pub integration_slug: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileChangedData {
    pub id: Option<String>,
    pub remote_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub modified_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub file_url: Option<String>,
    pub file_thumbnail_url: Option<String>,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub remote_created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub remote_updated_at: Option<DateTime<Utc>>,
}

/// Reads an ISO 8601 timestamp.
///
/// A timestamp without offset (`2021-09-15T10:30:00`) or a date alone (`2021-09-15`, midnight)
/// is read as UTC.
fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    parse_timestamp(&value)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid ISO 8601 timestamp `{}`", value)))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&timestamp));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|timestamp| Utc.from_utc_datetime(&timestamp))
}

impl FileChangedEvent {
    /// Syntax errors and fields of the wrong type are told apart, they are reported differently
    pub fn try_parsing(data: &[u8]) -> Result<Self, FileChangedEventError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(FileChangedEventError::InvalidJsonData)?;

        serde_json::from_value(value).map_err(FileChangedEventError::InvalidFieldValue)
    }

    /// Maps `data` field by field into the record to upsert.
    ///
    /// Fails if `data` or `data.id` is missing, or if the id is empty.
    pub fn into_file_record(self) -> Result<FileRecord, FileChangedEventError> {
        let data = self.data.ok_or(FileChangedEventError::MissingFileId)?;

        let id = match data.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(FileChangedEventError::MissingFileId),
        };

        Ok(FileRecord::builder()
            .id(id)
            .remote_id(data.remote_id)
            .created_at(data.created_at)
            .modified_at(data.modified_at)
            .name(data.name)
            .file_url(data.file_url)
            .file_thumbnail_url(data.file_thumbnail_url)
            .size(data.size)
            .mime_type(data.mime_type)
            .description(data.description)
            .remote_created_at(data.remote_created_at)
            .remote_updated_at(data.remote_updated_at)
            .build())
    }

    pub fn hook_id(&self) -> Option<&str> {
        self.hook.as_ref().and_then(|hook| hook.id.as_deref())
    }

    pub fn hook_event(&self) -> Option<&str> {
        self.hook.as_ref().and_then(|hook| hook.event.as_deref())
    }

    pub fn linked_account_id(&self) -> Option<&str> {
        self.linked_account
            .as_ref()
            .and_then(|account| account.id.as_deref())
    }

    pub fn integration(&self) -> Option<&str> {
        self.linked_account
            .as_ref()
            .and_then(|account| account.integration_slug.as_deref())
    }

    pub fn category(&self) -> Option<&str> {
        self.linked_account
            .as_ref()
            .and_then(|account| account.category.as_deref())
    }
}

#[derive(thiserror::Error)]
pub enum FileChangedEventError {
    #[error("Data is not valid JSON: {0}")]
    InvalidJsonData(#[source] serde_json::Error),

    #[error("Data did not represent a valid file changed event: {0}")]
    InvalidFieldValue(#[source] serde_json::Error),

    #[error("The event has no `data.id` identifying the changed file")]
    MissingFileId,
}

impl std::fmt::Debug for FileChangedEventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
