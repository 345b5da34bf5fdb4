//! Common error types shared across DriveGate modules.
//!
//! Every crate in the workspace reports failures through the single
//! [`Error`] taxonomy so the request boundary can map them to HTTP
//! responses uniformly.

pub mod error;

pub use error::{Error, Result};
