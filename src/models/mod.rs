// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for users, credentials, and file transfer results.

pub mod file;
pub mod user;

pub use file::{DriveFile, FileEntry, FileMetadata, TransferResult};
pub use user::{Credentials, Session, UserIdentity};
