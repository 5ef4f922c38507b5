// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The URL-to-Drive transfer pipeline.
//!
//! For each URL in a batch: download (streaming, size-capped, timeout
//! bound), pipe the stream into a Drive upload scheduled through the
//! user's rate limiter, and record the resulting file ID. Every URL
//! settles independently; one failure never aborts its siblings.

use crate::db::Database;
use crate::error::AppError;
use crate::format::human_size;
use crate::models::{DriveFile, FileEntry, FileMetadata, TransferResult};
use crate::services::drive::DriveClient;
use crate::services::google_auth::AuthUser;
use crate::services::limiter::{backoff_delay, LimiterRegistry, MAX_THROTTLE_RETRIES};
use futures_util::future::join_all;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Maximum accepted download size: 5,120 GiB.
pub const MAX_FILE_SIZE: u64 = 5120 * 1024 * 1024 * 1024;

/// Drive query for the whole-Drive listing endpoint.
const OWNED_FILES_QUERY: &str = "'me' in owners and trashed = false";

/// Per-item pipeline failure. These become `status: "error"` result
/// entries and never propagate past the batch boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Download failed: {0}")]
    DownloadFailed(u16),

    #[error("File size {size} bytes exceeds maximum allowed size of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Download timed out after {0}ms")]
    Timeout(u64),

    #[error("Error fetching file: {0}")]
    Network(String),

    #[error("{0}")]
    Upload(AppError),

    #[error("File uploaded but not recorded: {0}")]
    Record(String),
}

/// An open download: the response stream plus what we learned about it.
struct Download {
    response: reqwest::Response,
    file_name: String,
}

/// Transfer pipeline and file-listing service.
#[derive(Clone)]
pub struct TransferService {
    http: reqwest::Client,
    drive: DriveClient,
    db: Database,
    limiters: Arc<LimiterRegistry>,
    download_timeout: Duration,
}

impl TransferService {
    pub fn new(
        drive: DriveClient,
        db: Database,
        limiters: Arc<LimiterRegistry>,
        download_timeout: Duration,
    ) -> Result<Self, AppError> {
        // The timeout bounds connection setup and between-chunk inactivity,
        // not total transfer time: an actively streaming download may run
        // far longer than the timeout and must not be cut off mid-stream.
        let http = reqwest::Client::builder()
            .connect_timeout(download_timeout)
            .read_timeout(download_timeout)
            .build()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to build download client: {}", e))
            })?;
        Ok(Self {
            http,
            drive,
            db,
            limiters,
            download_timeout,
        })
    }

    // ─── Batch Upload ────────────────────────────────────────────

    /// Transfer a batch of URLs for one user. The result list matches the
    /// input length and order, with every URL settling independently.
    pub async fn upload_batch(&self, user: &AuthUser, urls: &[String]) -> Vec<TransferResult> {
        tracing::info!(
            google_id = %user.google_id,
            count = urls.len(),
            "Uploading batch of URLs"
        );
        join_all(urls.iter().map(|url| self.transfer_one(user, url))).await
    }

    async fn transfer_one(&self, user: &AuthUser, url: &str) -> TransferResult {
        match self.try_transfer(user, url).await {
            Ok(file) => {
                tracing::info!(
                    google_id = %user.google_id,
                    url,
                    file_id = %file.id,
                    "File uploaded"
                );
                let size = file
                    .size_bytes()
                    .map(human_size)
                    .unwrap_or_else(|| "Unknown".to_string());
                TransferResult::Success {
                    url: url.to_string(),
                    name: file.name.unwrap_or_default(),
                    mime_type: file.mime_type.unwrap_or_default(),
                    size,
                    web_view_link: file.web_view_link,
                }
            }
            Err(e) => {
                tracing::error!(url, error = %e, "Transfer failed");
                TransferResult::Error {
                    url: url.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_transfer(&self, user: &AuthUser, url: &str) -> Result<DriveFile, TransferError> {
        let mut download = self.open_download(url).await?;
        let file_name = download.file_name.clone();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        tracing::info!(url, file = %file_name, mime = %mime_type, "Starting upload");

        let limiter = self.limiters.get_or_create(&user.google_id);
        let mut retry = 0;
        let file = loop {
            limiter.acquire().await;
            let body = reqwest::Body::wrap_stream(download.response.bytes_stream());
            match self
                .drive
                .create_file(&user.access_token, &file_name, &mime_type, body)
                .await
            {
                Ok(file) => break file,
                Err(e) if e.is_rate_limited() && retry < MAX_THROTTLE_RETRIES => {
                    let delay = backoff_delay(retry);
                    retry += 1;
                    tracing::warn!(
                        url,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Upload throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    // The previous attempt consumed the stream; reopen it.
                    download = self.open_download(url).await?;
                }
                Err(e) => return Err(TransferError::Upload(e)),
            }
        };

        self.db
            .record_file(&user.google_id, &file.id)
            .await
            .map_err(|e| TransferError::Record(e.to_string()))?;

        Ok(file)
    }

    /// Fetch phase: validate the URL, open the download, and enforce the
    /// status and size bounds. The body is left unread. The client's
    /// inactivity timeout covers connecting and waiting for headers here;
    /// mid-body stalls surface later, when the upload consumes the stream.
    async fn open_download(&self, url: &str) -> Result<Download, TransferError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|_| TransferError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https" | "ftp") || parsed.host_str().is_none() {
            return Err(TransferError::InvalidUrl(url.to_string()));
        }

        let file_name = parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .unwrap_or_else(|| format!("unknown_{}", chrono::Utc::now().timestamp_millis()));

        let response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransferError::Timeout(self.download_timeout.as_millis() as u64)
                } else {
                    TransferError::Network(e.to_string())
                }
            })?;

        if response.status() != StatusCode::OK {
            return Err(TransferError::DownloadFailed(response.status().as_u16()));
        }

        if let Some(size) = response.content_length() {
            if size > MAX_FILE_SIZE {
                return Err(TransferError::TooLarge {
                    size,
                    max: MAX_FILE_SIZE,
                });
            }
        }

        Ok(Download {
            response,
            file_name,
        })
    }

    // ─── Listings ────────────────────────────────────────────────

    /// Live metadata for every file previously recorded for this user.
    ///
    /// Metadata fetches share the user's upload throttle budget. A file the
    /// provider no longer has yields a typed error entry; the rest of the
    /// listing proceeds.
    pub async fn uploaded_files(&self, user: &AuthUser) -> Result<Vec<FileEntry>, AppError> {
        let file_ids = self.db.file_ids(&user.google_id).await?;
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }

        let limiter = self.limiters.get_or_create(&user.google_id);
        let entries = join_all(file_ids.into_iter().map(|file_id| {
            let limiter = limiter.clone();
            async move {
                let fetched = limiter
                    .schedule(|| self.drive.get_file(&user.access_token, &file_id))
                    .await;
                match fetched {
                    Ok(file) => FileEntry::File(FileMetadata::from(file)),
                    Err(e) => {
                        tracing::error!(file_id = %file_id, error = %e, "File fetch failed");
                        let error = match e {
                            AppError::NotFound(msg) => msg,
                            other => other.to_string(),
                        };
                        FileEntry::Error { id: file_id, error }
                    }
                }
            }
        }))
        .await;

        Ok(entries)
    }

    /// All files the user owns on Drive, through the same throttle budget.
    pub async fn all_files(&self, user: &AuthUser) -> Result<Vec<FileMetadata>, AppError> {
        let limiter = self.limiters.get_or_create(&user.google_id);
        let files = limiter
            .schedule(|| self.drive.list_files(&user.access_token, OWNED_FILES_QUERY))
            .await?;
        Ok(files.into_iter().map(FileMetadata::from).collect())
    }
}
