//! Outbound/inbound message model.
//!
//! The relay never looks inside `payload`; `msg_type` is the only field it
//! reads, and only for logging.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport frame kind a serializer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// One relayed message. Immutable once handed to a mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// Message kind (field name is `type` on the wire).
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Optional room tag; empty when the message is not room-scoped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub room: String,
    /// Opaque payload.
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, payload: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            room: String::new(),
            payload,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }
}
