//! Per-connection lifecycle.
//!
//! `Connecting -> Active -> Draining -> Closed`
//!
//! While active, a session owns two tasks: the receive loop (read, stamp,
//! enqueue) and a completion waiter parked on the connection's cancellation
//! token. Whichever finishes first moves the session to draining; both tasks
//! are woken and joined before the session deregisters and returns.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chatrelay_core::error::{RelayError, Result};

use crate::realtime::core::RelayCtx;
use crate::realtime::types::{Broadcast, MessageSink, MessageStream, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Draining,
    Closed,
}

/// Why a session ended.
#[derive(Debug)]
pub enum CloseReason {
    /// Client closed the stream. Normal disconnect.
    RemoteClosed,
    /// Connection's cancellation token fired (server shutdown, eviction,
    /// writer failure).
    Cancelled,
    /// Transport or protocol error.
    Failed(RelayError),
}

impl CloseReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            CloseReason::RemoteClosed => "remote_closed",
            CloseReason::Cancelled => "cancelled",
            CloseReason::Failed(_) => "error",
        }
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub id: SessionId,
    pub reason: CloseReason,
    /// Messages read and enqueued.
    pub received: u64,
    pub state: SessionState,
}

enum LoopExit {
    RemoteClosed,
    Cancelled,
}

pub struct ClientSession {
    id: SessionId,
    ctx: RelayCtx,
    state: SessionState,
}

impl ClientSession {
    /// Allocate an id and register `sink` under it.
    pub fn connect(ctx: RelayCtx, sink: Arc<dyn MessageSink>) -> Result<Self> {
        let id = ctx.registry.next_id();
        let mut session = Self {
            id,
            ctx,
            state: SessionState::Connecting,
        };
        session.ctx.registry.register(session.id.clone(), sink)?;
        session.ctx.metrics.sessions_active.inc(&[]);
        session.transition(SessionState::Active);
        tracing::info!(session = %session.id, "client connected");
        Ok(session)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to `Closed`. Returns once both the receive loop and
    /// the completion waiter have exited and the registry entry is gone.
    pub async fn run<S>(mut self, stream: S, closed: CancellationToken) -> SessionReport
    where
        S: MessageStream + 'static,
    {
        // Child of the connection token: fires on connection teardown, and
        // can be fired locally to unwind both tasks.
        let stop = closed.child_token();
        let _unwind = stop.clone().drop_guard();

        let mut receiver = tokio::spawn(receive_loop(
            self.id.clone(),
            self.ctx.clone(),
            stream,
            stop.clone(),
        ));
        let waiter_stop = stop.clone();
        let mut waiter = tokio::spawn(async move { waiter_stop.cancelled().await });

        let first = tokio::select! {
            res = &mut receiver => Some(res),
            _ = &mut waiter => None,
        };

        self.transition(SessionState::Draining);
        stop.cancel();

        let joined = match first {
            Some(res) => {
                let _ = waiter.await;
                res
            }
            None => receiver.await,
        };

        let (reason, received) = match joined {
            Ok((Ok(LoopExit::RemoteClosed), n)) => (CloseReason::RemoteClosed, n),
            Ok((Ok(LoopExit::Cancelled), n)) => (CloseReason::Cancelled, n),
            Ok((Err(e), n)) if e.is_connection_ended() => (CloseReason::RemoteClosed, n),
            Ok((Err(e), n)) => (CloseReason::Failed(e), n),
            Err(join_err) => (
                CloseReason::Failed(RelayError::Internal(format!("receive loop aborted: {join_err}"))),
                0,
            ),
        };

        match &reason {
            CloseReason::Failed(e) => {
                tracing::warn!(session = %self.id, error = %e, "session failed")
            }
            _ => tracing::debug!(session = %self.id, reason = reason.as_label(), "session ending"),
        }

        self.close();
        self.ctx
            .metrics
            .session_closes
            .inc(&[("reason", reason.as_label())]);

        SessionReport {
            id: self.id.clone(),
            reason,
            received,
            state: self.state,
        }
    }

    /// Deregister. Runs at most once per session.
    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.ctx.registry.unregister(&self.id) {
            tracing::debug!(session = %self.id, "deregistered");
        }
        self.ctx.metrics.sessions_active.dec(&[]);
        self.transition(SessionState::Closed);
        tracing::info!(session = %self.id, "client disconnected");
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        // Session dropped without finishing `run`.
        if self.state != SessionState::Connecting {
            self.close();
        }
    }
}

async fn receive_loop<S: MessageStream>(
    id: SessionId,
    ctx: RelayCtx,
    mut stream: S,
    stop: CancellationToken,
) -> (Result<LoopExit>, u64) {
    let mut received = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => return (Ok(LoopExit::Cancelled), received),
            next = stream.recv() => next,
        };

        let mut message = match next {
            Ok(Some(m)) => m,
            Ok(None) => return (Ok(LoopExit::RemoteClosed), received),
            Err(e) => return (Err(e), received),
        };

        message.stamp(ctx.clock.now_unix());
        tracing::debug!(session = %id, sender = %message.sender, len = message.text.len(), "received");
        ctx.metrics.messages_received.inc(&[]);

        let item = Broadcast {
            origin: id.clone(),
            message,
        };
        tokio::select! {
            biased;
            _ = stop.cancelled() => return (Ok(LoopExit::Cancelled), received),
            res = ctx.queue.enqueue(item) => {
                if let Err(e) = res {
                    return (Err(e), received);
                }
            }
        }
        received += 1;
    }
}
