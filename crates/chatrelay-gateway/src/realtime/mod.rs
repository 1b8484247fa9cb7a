//! Realtime relay: client sessions fan in to one bounded queue, a single
//! dispatcher fans out to every other registered sink.
//!
//! ```text
//! client -> session receive loop -> BroadcastQueue -> FanoutDispatcher
//!        -> ConnectionRegistry -> every other client's sink
//! ```

pub mod core;
pub mod types;

pub use self::core::{
    BroadcastQueue, ClientSession, CloseReason, ConnectionRegistry, DispatchSummary,
    FanoutDispatcher, QueueDrain, RelayCtx, SessionReport, SessionState,
};
pub use self::types::{Broadcast, MessageSink, MessageStream, SessionId};
