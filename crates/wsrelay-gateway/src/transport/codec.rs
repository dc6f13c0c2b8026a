//! Decode-once codec for inbound frames.
//!
//! - Text and binary frames => relay `Message` via the connection's deserializer
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message as Frame;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::{Deserializer, Message};

#[derive(Debug)]
pub enum Inbound {
    Msg { msg: Message, bytes_len: usize },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub fn decode(frame: Frame, codec: &dyn Deserializer) -> Result<Inbound> {
    match frame {
        Frame::Text(s) => {
            let msg = codec.deserialize(s.as_bytes())?;
            Ok(Inbound::Msg { msg, bytes_len: s.len() })
        }
        Frame::Binary(b) => {
            let msg = codec.deserialize(&b)?;
            Ok(Inbound::Msg { msg, bytes_len: b.len() })
        }
        Frame::Ping(v) => Ok(Inbound::Ping(v)),
        Frame::Pong(v) => Ok(Inbound::Pong(v)),
        Frame::Close(_) => Ok(Inbound::Close),
    }
}
