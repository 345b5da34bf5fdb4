//! Credential pool and token acquisition for DriveGate.
//!
//! This module provides:
//! - The [`Credential`] tagged union (delegated user or service account)
//! - The [`AccountPool`] with windowed pseudo-random selection
//! - The [`TokenBroker`] that turns a credential into a live bearer token,
//!   caching it on the account until shortly before expiry

pub mod broker;
pub mod credential;
pub mod pool;

pub use broker::TokenBroker;
pub use credential::{Account, Credential};
pub use pool::{AccountPool, PoolConfig, PoolSource, NS_ACCOUNT};
