//! Chat message wire vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use serde::Deserialize;

use chatrelay_core::{ChatMessage, ErrorFrame, RelayError};

#[derive(Debug, Deserialize)]
struct TestVector {
    description: String,
    frame: String,
    #[serde(default)]
    expect: Option<serde_json::Value>,
    #[serde(default)]
    expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
struct ExpectError {
    code: String,
}

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

#[test]
fn parse_message_min() {
    let msg = ChatMessage::from_json(&load("message_min.json")).unwrap();
    assert_eq!(msg.sender, "alice");
    assert_eq!(msg.text, "hello");
    assert_eq!(msg.timestamp, 0);
}

#[test]
fn parse_legacy_user_key() {
    let msg = ChatMessage::from_json(&load("message_legacy_user.json")).unwrap();
    assert_eq!(msg.sender, "User-bob");
    assert_eq!(msg.timestamp, 1_700_000_000);
}

#[test]
fn message_vectors() {
    let vectors: Vec<TestVector> = serde_json::from_str(&load("messages.json")).unwrap();
    assert!(!vectors.is_empty());

    for v in vectors {
        let res = ChatMessage::from_json(&v.frame);
        match (&v.expect, &v.expect_error) {
            (Some(expect), None) => {
                let msg = res.unwrap_or_else(|e| panic!("{}: {e}", v.description));
                let got = serde_json::to_value(&msg).unwrap();
                assert_eq!(&got, expect, "{}", v.description);
            }
            (None, Some(err)) => {
                let e = res.expect_err(&v.description);
                assert_eq!(e.client_code().as_str(), err.code, "{}", v.description);
            }
            _ => panic!("vector must set exactly one of expect/expect_error: {}", v.description),
        }
    }
}

#[test]
fn stamp_overwrites_client_timestamp() {
    let mut msg = ChatMessage::from_json(&load("message_legacy_user.json")).unwrap();
    msg.stamp(100);
    assert_eq!(msg.timestamp, 100);

    let out: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(out["sender"], "User-bob");
    assert_eq!(out["timestamp"], 100);
    assert!(out.get("user").is_none());
}

#[test]
fn error_frame_carries_client_code() {
    let frame = ErrorFrame::from_error(&RelayError::PayloadTooLarge);
    let json = frame.to_json().unwrap();
    assert_eq!(json, r#"{"error":{"code":"PAYLOAD_TOO_LARGE","msg":"payload too large"}}"#);

    // an error frame must never be mistaken for a chat line
    assert!(ChatMessage::from_json(&json).is_err());
}

#[test]
fn connection_ended_is_not_a_failure_code() {
    assert!(RelayError::ConnectionEnded.is_connection_ended());
    assert!(!RelayError::Transport("reset".into()).is_connection_ended());
    assert_eq!(RelayError::DuplicateId("client-1".into()).client_code().as_str(), "INTERNAL");
}
