//! JSON codec behaviour tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use wsrelay_core::protocol::{Deserializer, FrameKind, JsonCodec, Message, Serializer};

#[test]
fn serialize_uses_type_field_and_text_frames() {
    let msg = Message::new("signal", json!({ "sdp": "v=0" })).with_room("lobby");
    let bytes = JsonCodec.serialize(&msg).unwrap();

    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["type"], "signal");
    assert_eq!(v["room"], "lobby");
    assert_eq!(v["payload"]["sdp"], "v=0");
    assert_eq!(JsonCodec.frame_kind(), FrameKind::Text);
}

#[test]
fn empty_room_is_omitted() {
    let msg = Message::new("ready", json!(null));
    let s = String::from_utf8(JsonCodec.serialize(&msg).unwrap().to_vec()).unwrap();
    assert!(!s.contains("room"));
}

#[test]
fn deserialize_min() {
    let msg = JsonCodec.deserialize(br#"{"type":"ping"}"#).unwrap();
    assert_eq!(msg.msg_type, "ping");
    assert!(msg.room.is_empty());
    assert!(msg.payload.is_null());
}

#[test]
fn deserialize_is_inverse_of_serialize() {
    let msg = Message::new("chat", json!({ "text": "hi" })).with_room("r1");
    let bytes = JsonCodec.serialize(&msg).unwrap();
    assert_eq!(JsonCodec.deserialize(&bytes).unwrap(), msg);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = JsonCodec
        .deserialize(br#"{"type":"ping","extra":1}"#)
        .expect_err("must fail");
    assert_eq!(err.code(), "DECODE");
}

#[test]
fn garbage_and_empty_type_are_decode_errors() {
    assert_eq!(JsonCodec.deserialize(b"\xff\x00").unwrap_err().code(), "DECODE");
    assert_eq!(
        JsonCodec.deserialize(br#"{"type":""}"#).unwrap_err().code(),
        "DECODE"
    );
}
