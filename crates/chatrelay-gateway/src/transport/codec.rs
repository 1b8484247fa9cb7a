//! Decode-once codec for the transport layer.
//!
//! - Text frames => `ChatMessage` (size checked before parsing)
//! - Binary frames => rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use chatrelay_core::{
    error::{RelayError, Result},
    ChatMessage, ErrorFrame,
};

#[derive(Debug)]
pub enum Inbound {
    Chat(ChatMessage),
    Ping(Vec<u8>),
    Pong,
    Close,
}

pub fn decode(msg: Message, max_frame_bytes: usize) -> Result<Inbound> {
    match msg {
        Message::Text(s) => {
            if s.len() > max_frame_bytes {
                return Err(RelayError::PayloadTooLarge);
            }
            Ok(Inbound::Chat(ChatMessage::from_json(&s)?))
        }
        Message::Binary(_) => Err(RelayError::BadRequest("binary frames are not supported".into())),
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(_) => Ok(Inbound::Pong),
        Message::Close(_) => Ok(Inbound::Close),
    }
}

pub fn encode(msg: &ChatMessage) -> Result<Message> {
    Ok(Message::Text(msg.to_json()?))
}

pub fn error_frame(err: &RelayError) -> Result<Message> {
    Ok(Message::Text(ErrorFrame::from_error(err).to_json()?))
}
