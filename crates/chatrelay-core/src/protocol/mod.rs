//! Wire formats exchanged with chat clients.
//!
//! Every frame is a JSON text document: `ChatMessage` in both directions,
//! plus `ErrorFrame` from server to client right before a protocol-error
//! disconnect. Parsers are panic-free; malformed input is reported as
//! `RelayError::BadRequest`.

pub mod message;
