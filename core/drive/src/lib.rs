//! Google Drive proxy operations for DriveGate.
//!
//! This module provides:
//! - A thin typed client for the handful of Drive v3 calls the proxy needs
//! - The continuation manager that seals upstream cursors (plus the
//!   selected credential identity) into opaque client-held tokens
//! - The [`Drive`] facade composing pool selection, token acquisition,
//!   API calls, and continuation handling

pub mod client;
pub mod continuation;
pub mod proxy;
pub mod types;

pub use client::DriveClient;
pub use continuation::{Continuations, NS_PAGE_TOKEN};
pub use proxy::Drive;
pub use types::{CopyInit, DriveCollection, DriveFile, FileList, UploadPoll};
