//! chatrelay gateway library entry.
//!
//! Wires the relay core (registry, broadcast queue, fan-out dispatcher,
//! client sessions) to a WebSocket transport and the ops endpoints. Consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod realtime;
pub mod router;
pub mod transport;
