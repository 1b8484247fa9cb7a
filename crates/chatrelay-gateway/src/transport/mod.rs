//! Transport layer (WebSocket).
//!
//! Adapts an axum WebSocket into the relay's `MessageStream`/`MessageSink`
//! seams. Frames are decoded once in the codec before they reach a session.

pub mod codec;
pub mod sink;
pub mod ws;
