// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::models::{FileEntry, FileMetadata, TransferResult};
use crate::services::google_auth::AuthUser;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (session required; the auth middleware is applied in
/// routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/upload-files", post(upload_files))
        .route("/api/v1/get-uploaded-files", get(get_uploaded_files))
        .route("/api/v1/get-all-files", get(get_all_files))
}

// ─── Batch Upload ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub results: Vec<TransferResult>,
}

/// Upload a batch of URLs to the user's Drive.
async fn upload_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    if request.urls.is_empty() {
        return Err(AppError::BadRequest("Provide an array of URLs".to_string()));
    }

    let results = state.transfer.upload_batch(&user, &request.urls).await;
    tracing::info!(
        google_id = %user.google_id,
        total = results.len(),
        succeeded = results.iter().filter(|r| r.is_success()).count(),
        "Batch upload finished"
    );

    Ok(Json(UploadResponse { results }))
}

// ─── Listings ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UploadedFilesResponse {
    pub files: Vec<FileEntry>,
}

/// Live metadata for the files this service uploaded for the user.
async fn get_uploaded_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UploadedFilesResponse>> {
    let files = state.transfer.uploaded_files(&user).await?;
    tracing::info!(google_id = %user.google_id, count = files.len(), "Listed uploaded files");
    Ok(Json(UploadedFilesResponse { files }))
}

#[derive(Serialize)]
pub struct AllFilesResponse {
    pub files: Vec<FileMetadata>,
}

/// All files the user owns on Drive.
async fn get_all_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AllFilesResponse>> {
    let files = state.transfer.all_files(&user).await?;
    tracing::info!(google_id = %user.google_id, count = files.len(), "Listed Drive files");
    Ok(Json(AllFilesResponse { files }))
}
