use chrono::{DateTime, Utc};
use typed_builder::TypedBuilder;

/// Metadata of one file of the remote document storage.
///
/// `id` is the stable identifier given by Merge: every delivery about the same file carries
/// the same `id`. Every other field replaces the stored value as a whole on each delivery.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct FileRecord {
    #[builder(setter(into))]
    pub id: String,

    /// Identifier of the file in the third-party storage (Google Drive, Dropbox ...)
    #[builder(default)]
    pub remote_id: Option<String>,

    #[builder(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub modified_at: Option<DateTime<Utc>>,

    #[builder(default)]
    pub name: Option<String>,
    #[builder(default)]
    pub file_url: Option<String>,
    #[builder(default)]
    pub file_thumbnail_url: Option<String>,

    /// In bytes
    #[builder(default)]
    pub size: Option<i64>,
    #[builder(default)]
    pub mime_type: Option<String>,
    #[builder(default)]
    pub description: Option<String>,

    #[builder(default)]
    pub remote_created_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub remote_updated_at: Option<DateTime<Utc>>,
}
