use crate::broker::Message;
use crate::transport::message::{Inbound, decode, encode, send_message};
use bytes::Bytes;
use futures_util::sink::unfold;
use serde_json::json;
use std::pin::pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

#[test]
fn test_encode_uses_header_and_base64_body() {
    let frame = encode(&Message::new("sensor", "hello")).unwrap();
    let text = frame.to_text().unwrap();
    let value: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(value, json!({ "header": "sensor", "body": "aGVsbG8=" }));
}

#[test]
fn test_decode_text_frame() {
    let text = json!({ "header": "ping", "body": "eA==" }).to_string();
    let inbound = decode(WsMessage::text(text)).unwrap();
    assert_eq!(inbound, Inbound::Message(Message::new("ping", "x")));
}

#[test]
fn test_decode_binary_frame() {
    let data = json!({ "header": "ping", "body": "eA==" }).to_string();
    let inbound = decode(WsMessage::Binary(Bytes::from(data))).unwrap();
    assert_eq!(inbound, Inbound::Message(Message::new("ping", "x")));
}

#[test]
fn test_decode_null_or_missing_body_is_empty() {
    let null_body = json!({ "header": "a", "body": null }).to_string();
    let missing_body = json!({ "header": "a" }).to_string();

    for text in [null_body, missing_body] {
        match decode(WsMessage::text(text)).unwrap() {
            Inbound::Message(message) => {
                assert_eq!(message.topic, "a");
                assert!(message.payload.is_empty());
            }
            other => panic!("Expected a message, got {other:?}"),
        }
    }
}

#[test]
fn test_decode_control_frames() {
    assert_eq!(decode(WsMessage::Ping(Bytes::new())).unwrap(), Inbound::Ping);
    assert_eq!(decode(WsMessage::Pong(Bytes::new())).unwrap(), Inbound::Pong);
    assert_eq!(decode(WsMessage::Close(None)).unwrap(), Inbound::Close);
}

#[test]
fn test_decode_rejects_malformed_frames() {
    assert!(decode(WsMessage::text("not json")).is_err());
    assert!(decode(WsMessage::text(json!({ "body": "eA==" }).to_string())).is_err());
    assert!(decode(WsMessage::text(json!({ "header": "a", "body": "%%%" }).to_string())).is_err());
}

#[tokio::test]
async fn test_send_message_writes_one_text_frame() {
    let (written, mut frames) = mpsc::unbounded_channel::<WsMessage>();
    let sink = unfold(written, |written, frame: WsMessage| async move {
        let _ = written.send(frame);
        Ok::<_, tungstenite::Error>(written)
    });
    let mut sink = pin!(sink);

    send_message(&mut sink, &Message::new("t", "payload"), Duration::from_secs(1))
        .await
        .unwrap();

    let frame = frames.try_recv().expect("no frame written");
    assert!(frame.is_text());
    assert_eq!(
        decode(frame).unwrap(),
        Inbound::Message(Message::new("t", "payload"))
    );
    assert!(frames.try_recv().is_err());
}
