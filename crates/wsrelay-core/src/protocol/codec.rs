//! Byte encoding seam between the relay and the transport.
//!
//! The relay only needs `Serializer`; the gateway's read half also uses
//! `Deserializer` for inbound text frames.

use bytes::Bytes;

use crate::error::{RelayError, Result};
use crate::protocol::message::{FrameKind, Message};

/// Encodes outbound messages. Implementations must be pure and deterministic.
pub trait Serializer: Send + Sync {
    /// Frame kind every payload from this serializer is written as.
    fn frame_kind(&self) -> FrameKind;

    fn serialize(&self, msg: &Message) -> Result<Bytes>;
}

/// Decodes inbound frames into messages.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, bytes: &[u8]) -> Result<Message>;
}

/// JSON codec: `{"type": ..., "room": ..., "payload": ...}` in text frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Serializer for JsonCodec {
    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }

    fn serialize(&self, msg: &Message) -> Result<Bytes> {
        serde_json::to_vec(msg)
            .map(Bytes::from)
            .map_err(|e| RelayError::Encode(format!("json encode failed: {e}")))
    }
}

impl Deserializer for JsonCodec {
    fn deserialize(&self, bytes: &[u8]) -> Result<Message> {
        let msg: Message = serde_json::from_slice(bytes)
            .map_err(|e| RelayError::Decode(format!("invalid message json: {e}")))?;
        if msg.msg_type.is_empty() {
            return Err(RelayError::Decode("message type must not be empty".into()));
        }
        Ok(msg)
    }
}
