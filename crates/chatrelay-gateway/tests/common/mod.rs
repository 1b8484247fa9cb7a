//! In-memory sink/stream doubles shared by relay tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatrelay_core::error::{RelayError, Result};
use chatrelay_core::{ChatMessage, ManualClock};
use chatrelay_gateway::obs::RelayMetrics;
use chatrelay_gateway::realtime::{FanoutDispatcher, MessageSink, MessageStream, RelayCtx};

/// Records every delivered message.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<ChatMessage>,
    pub closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            tx,
            closed: AtomicBool::new(false),
        });
        (sink, rx)
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&self, msg: &ChatMessage) -> Result<()> {
        self.tx
            .send(msg.clone())
            .map_err(|_| RelayError::DeliveryFailure("closed"))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Fails every delivery and counts attempts.
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
    pub closed: AtomicBool,
}

#[async_trait]
impl MessageSink for FailingSink {
    async fn deliver(&self, _msg: &ChatMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RelayError::DeliveryFailure("closed"))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Never completes a delivery on its own; relies on its timeout.
pub struct StalledSink {
    pub timeout: Duration,
}

#[async_trait]
impl MessageSink for StalledSink {
    async fn deliver(&self, _msg: &ChatMessage) -> Result<()> {
        tokio::time::sleep(self.timeout).await;
        Err(RelayError::DeliveryFailure("timeout"))
    }
}

/// Inbound stream fed by the test.
///
/// Dropping the feeder is a clean end of stream; pushing `Err` is a
/// transport failure.
pub struct FedStream {
    rx: mpsc::UnboundedReceiver<Result<ChatMessage>>,
}

pub type Feeder = mpsc::UnboundedSender<Result<ChatMessage>>;

impl FedStream {
    pub fn new() -> (Feeder, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl MessageStream for FedStream {
    async fn recv(&mut self) -> Result<Option<ChatMessage>> {
        match self.rx.recv().await {
            Some(Ok(m)) => Ok(Some(m)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

pub fn msg(sender: &str, text: &str) -> ChatMessage {
    ChatMessage::new(sender, text)
}

/// Relay with a manual clock.
pub fn relay(queue_capacity: usize, now: i64) -> (RelayCtx, FanoutDispatcher, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let (ctx, dispatcher) = RelayCtx::build(queue_capacity, clock.clone(), Arc::new(RelayMetrics::default()));
    (ctx, dispatcher, clock)
}

/// Poll until `cond` holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub async fn recv_within(rx: &mut mpsc::UnboundedReceiver<ChatMessage>, ms: u64) -> Option<ChatMessage> {
    tokio::time::timeout(Duration::from_millis(ms), rx.recv())
        .await
        .ok()
        .flatten()
}
