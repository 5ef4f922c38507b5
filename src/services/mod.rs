// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service layer.

pub mod drive;
pub mod google_auth;
pub mod limiter;
pub mod session;
pub mod transfer;

pub use drive::DriveClient;
pub use google_auth::{AuthDecision, AuthUser, GoogleAuthClient, TokenManager};
pub use limiter::{LimiterRegistry, RateLimiter};
pub use session::SessionStore;
pub use transfer::TransferService;
