//! Message model and byte codecs.
//!
//! Decoders are panic-free: malformed input is reported as
//! `RelayError::Decode` so a hostile peer cannot take the relay down.

pub mod codec;
pub mod message;

pub use codec::{Deserializer, JsonCodec, Serializer};
pub use message::{FrameKind, Message};
