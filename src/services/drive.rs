// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Drive v3 API client.
//!
//! Handles:
//! - Streaming multipart file creation (the download stream is the media
//!   part, never buffered)
//! - File listing and per-file metadata fetches
//! - Throttle (429) and not-found (404) detection for the rate limiter
//!   and the listing path

use crate::error::AppError;
use crate::models::DriveFile;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Metadata fields requested on every Drive call.
pub const FILE_FIELDS: &str =
    "id, name, mimeType, size, webViewLink, webContentLink, createdTime, modifiedTime";

/// Drive API client.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }

    /// Point the client at alternate endpoints (tests).
    pub fn with_base_urls(api_base: &str, upload_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.to_string(),
            upload_base: upload_base.to_string(),
        }
    }

    /// Create a file from a body stream via a multipart upload.
    ///
    /// The media part wraps the stream directly, so Drive consumes it at
    /// its own pace and backpressure reaches the download socket.
    pub async fn create_file(
        &self,
        access_token: &str,
        name: &str,
        mime_type: &str,
        body: reqwest::Body,
    ) -> Result<DriveFile, AppError> {
        let metadata = serde_json::json!({ "name": name, "mimeType": mime_type });

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| AppError::Drive(format!("Invalid metadata part: {}", e)))?,
            )
            .part(
                "file",
                Part::stream(body)
                    .file_name(name.to_string())
                    .mime_str(mime_type)
                    .map_err(|e| AppError::Drive(format!("Invalid MIME type {}: {}", mime_type, e)))?,
            );

        let url = format!("{}/files", self.upload_base);
        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Upload request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// List files matching a Drive query.
    pub async fn list_files(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<DriveFile>, AppError> {
        let url = format!("{}/files", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("q", query),
                ("fields", &format!("files({})", FILE_FIELDS)),
            ])
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        let listing: FileListResponse = self.check_response_json(response).await?;
        Ok(listing.files.unwrap_or_default())
    }

    /// Fetch metadata for a single file.
    pub async fn get_file(&self, access_token: &str, file_id: &str) -> Result<DriveFile, AppError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(AppError::NotFound(format!(
                "File with ID {} not found",
                file_id
            )));
        }

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            // Throttled - retried by the per-user rate limiter
            if status.as_u16() == 429 {
                tracing::warn!("Drive rate limit hit (429)");
                return Err(AppError::Drive(AppError::DRIVE_RATE_LIMIT.to_string()));
            }

            // Unauthorized - token expired or revoked
            if status.as_u16() == 401 {
                return Err(AppError::Drive(AppError::DRIVE_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::Drive(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Drive(format!("JSON parse error: {}", e)))
    }
}

/// Response shape of the Drive list endpoint.
#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Option<Vec<DriveFile>>,
}
