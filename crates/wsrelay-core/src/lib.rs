//! wsRelay core: transport-agnostic message model, codecs, and error types.
//!
//! This crate defines the message contract and error surface shared by the
//! gateway and anything that produces messages for it. It carries no
//! transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `RelayError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{RelayError, Result};
