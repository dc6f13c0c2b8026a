//! wsRelay gateway library entry.
//!
//! This crate wires the per-connection relay (mailbox + delivery loop) to a
//! WebSocket transport, with config, metrics, and a client registry around
//! it. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod obs;
pub mod ops;
pub mod registry;
pub mod router;
pub mod transport;
