//! Transport layer (WebSocket).
//!
//! Exposes the endpoint seam the relay writes through, the WebSocket
//! implementation of it together with the upgrade handler, and the inbound
//! codec.

pub mod codec;
pub mod endpoint;
pub mod ws;

pub use endpoint::Endpoint;
