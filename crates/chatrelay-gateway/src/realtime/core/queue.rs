use tokio::sync::mpsc;

use chatrelay_core::error::{RelayError, Result};

use crate::realtime::types::Broadcast;

/// Producer side of the bounded broadcast queue. One clone per session.
///
/// `enqueue` waits while the queue is full, so a slow dispatcher throttles
/// every sender. FIFO overall, hence FIFO per producer.
#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::Sender<Broadcast>,
}

/// Consumer side, owned by the single fan-out dispatcher.
pub struct QueueDrain {
    rx: mpsc::Receiver<Broadcast>,
}

impl BroadcastQueue {
    pub fn bounded(capacity: usize) -> (BroadcastQueue, QueueDrain) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (BroadcastQueue { tx }, QueueDrain { rx })
    }

    pub async fn enqueue(&self, item: Broadcast) -> Result<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| RelayError::Internal("broadcast queue closed".into()))
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl QueueDrain {
    /// Next message, or `None` once every producer is gone.
    pub async fn dequeue(&mut self) -> Option<Broadcast> {
        self.rx.recv().await
    }

    pub fn try_dequeue(&mut self) -> Option<Broadcast> {
        self.rx.try_recv().ok()
    }
}
