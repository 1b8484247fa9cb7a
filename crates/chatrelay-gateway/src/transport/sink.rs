use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use chatrelay_core::error::{RelayError, Result};
use chatrelay_core::ChatMessage;

use crate::realtime::MessageSink;
use crate::transport::codec;

/// Sink backed by a connection's bounded outbound queue.
///
/// The connection's writer task drains the queue onto the socket. A full
/// queue is waited on for at most `send_timeout`; a closed one fails at once.
pub struct ChannelSink {
    tx: mpsc::Sender<Message>,
    send_timeout: Duration,
    closed: CancellationToken,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Message>, send_timeout: Duration, closed: CancellationToken) -> Self {
        Self {
            tx,
            send_timeout,
            closed,
        }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn deliver(&self, msg: &ChatMessage) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(RelayError::DeliveryFailure("closed"));
        }
        let frame = codec::encode(msg)?;

        let frame = match self.tx.try_send(frame) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(RelayError::DeliveryFailure("closed")),
            Err(TrySendError::Full(frame)) => frame,
        };

        match timeout(self.send_timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::DeliveryFailure("closed")),
            Err(_) => Err(RelayError::DeliveryFailure("timeout")),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}
