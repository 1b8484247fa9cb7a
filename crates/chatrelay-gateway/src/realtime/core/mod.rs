//! Relay core components.
//!
//! Connection registry, broadcast queue, fan-out dispatcher, and the
//! per-connection client session, plus the context that ties them together.

mod fanout;
mod queue;
mod registry;
mod relay;
mod session;

pub use fanout::{DispatchSummary, FanoutDispatcher};
pub use queue::{BroadcastQueue, QueueDrain};
pub use registry::ConnectionRegistry;
pub use relay::RelayCtx;
pub use session::{ClientSession, CloseReason, SessionReport, SessionState};
