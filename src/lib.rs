// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drive-Courier: relay files from URLs into users' Google Drive.
//!
//! This crate provides the backend API for submitting batches of URLs,
//! streaming each resource into the authenticated user's Drive under
//! per-user rate limits, and listing what was uploaded.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Database;
use services::{SessionStore, TokenManager, TransferService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sessions: SessionStore,
    pub auth: TokenManager,
    pub transfer: TransferService,
}
