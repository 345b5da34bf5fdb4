//! Cryptographic primitives for DriveGate.
//!
//! This module provides:
//! - Per-namespace key derivation using Blake2b-256
//! - Authenticated encryption using XChaCha20-Poly1305
//! - URL-safe sealed tokens for pagination cursors, search cursors,
//!   login sessions, and remote credential blobs
//!
//! # Security Guarantees
//! - Keys are derived per namespace; tokens sealed under one namespace
//!   can never be opened under another
//! - `open` fails closed on any tampering, truncation, or malformed input
//! - Derived key material is zeroized after use

pub mod seal;

pub use seal::{TokenSealer, NONCE_SIZE, TAG_SIZE};
