//! chatrelay core: transport-agnostic message types, error surface, and clock.
//!
//! This crate defines the wire-level contracts shared by the gateway and the
//! terminal client. It carries no transport or runtime dependencies so the
//! relay logic can be driven by any bidirectional message stream.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `RelayError`/`Result` so a malformed
//! frame from one client never takes the relay down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod time;

/// Shared result type.
pub use error::{ClientCode, RelayError, Result};
pub use protocol::message::{ChatMessage, ErrorFrame};
pub use time::{Clock, ManualClock, SystemClock};
