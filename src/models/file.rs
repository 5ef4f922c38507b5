//! Drive file metadata and per-URL transfer results.

use crate::format::{display_timestamp, human_size};
use serde::{Deserialize, Serialize};

/// File metadata as returned by the Drive API.
///
/// Drive serializes `size` as a decimal string of bytes; documents without
/// binary content omit it entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<String>,
    pub web_view_link: Option<String>,
    pub web_content_link: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

impl DriveFile {
    /// Parsed byte size, when Drive reported one.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Display-formatted file metadata returned to API clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    /// Humanized size, e.g. `"1.50 KB"`, or `"Unknown"` when absent.
    pub size: String,
    pub web_view_link: Option<String>,
    pub web_content_link: Option<String>,
    /// `yyyy-MM-dd HH:mm:ss` or `"Unknown"`.
    pub created_time: String,
    pub modified_time: String,
}

impl From<DriveFile> for FileMetadata {
    fn from(file: DriveFile) -> Self {
        let size = file
            .size_bytes()
            .map(human_size)
            .unwrap_or_else(|| "Unknown".to_string());
        FileMetadata {
            size,
            created_time: display_timestamp(file.created_time.as_deref()),
            modified_time: display_timestamp(file.modified_time.as_deref()),
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            web_view_link: file.web_view_link,
            web_content_link: file.web_content_link,
        }
    }
}

/// One entry in the uploaded-files listing: live metadata, or a typed error
/// when the provider no longer has the recorded file.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FileEntry {
    File(FileMetadata),
    Error { id: String, error: String },
}

/// Per-URL outcome of a batch transfer. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferResult {
    #[serde(rename_all = "camelCase")]
    Success {
        url: String,
        name: String,
        mime_type: String,
        /// Humanized size of the uploaded file.
        size: String,
        web_view_link: Option<String>,
    },
    Error { url: String, error: String },
}

impl TransferResult {
    /// The input URL this result corresponds to.
    pub fn url(&self) -> &str {
        match self {
            TransferResult::Success { url, .. } => url,
            TransferResult::Error { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }
}
