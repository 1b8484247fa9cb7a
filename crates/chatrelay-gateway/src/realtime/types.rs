use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use chatrelay_core::error::Result;
use chatrelay_core::ChatMessage;

/// Per-connection identifier, unique for the lifetime of its registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn from_seq(seq: u64) -> Self {
        Self(Arc::from(format!("client-{seq}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

/// Outbound half of one client connection.
///
/// Implementations must bound how long `deliver` can stall (the transport's
/// own send timeout); the dispatcher waits on every recipient of a cycle.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, msg: &ChatMessage) -> Result<()>;

    /// Ask the transport to tear the connection down. Called after the
    /// dispatcher has evicted this sink.
    fn close(&self) {}
}

/// Inbound half of one client connection.
#[async_trait]
pub trait MessageStream: Send {
    /// `Ok(None)` is a clean end of stream.
    async fn recv(&mut self) -> Result<Option<ChatMessage>>;
}

/// Queue item: a stamped message plus the session it came from.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub origin: SessionId,
    pub message: ChatMessage,
}
