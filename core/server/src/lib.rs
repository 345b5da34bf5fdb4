//! HTTP surface of DriveGate.
//!
//! This module provides:
//! - The axum router mapping inbound paths to proxy operations
//! - Session authentication over sealed `userToken` cookies, re-validated
//!   against the external user directory on every request
//! - The access guard enforcing per-user allow/deny lists over drives
//! - Static asset passthrough for everything the API does not claim
//!
//! All multi-request state (session, pagination, upload relay) lives in
//! tokens held by the client; the server keeps nothing between requests.

pub mod assets;
pub mod config;
pub mod guard;
pub mod routes;
pub mod session;
pub mod users;

pub use config::Config;
pub use routes::{router, AppState};
pub use users::{User, UserDirectory};
