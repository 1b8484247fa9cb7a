use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use chatrelay_core::RelayError;

use crate::obs::RelayMetrics;
use crate::realtime::core::{ConnectionRegistry, QueueDrain};
use crate::realtime::types::Broadcast;

/// Result of one dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Single consumer of the broadcast queue.
///
/// Each cycle snapshots the registry, delivers to every recipient
/// concurrently and waits for all of them before dequeuing the next
/// message, so every recipient sees messages in queue order. A recipient
/// whose sink fails is evicted in the same cycle; nothing is retried.
pub struct FanoutDispatcher {
    registry: Arc<ConnectionRegistry>,
    drain: QueueDrain,
    metrics: Arc<RelayMetrics>,
    echo_to_sender: bool,
}

impl FanoutDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, drain: QueueDrain, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            registry,
            drain,
            metrics,
            echo_to_sender: false,
        }
    }

    /// Also deliver each message back to the session that sent it.
    pub fn echo_to_sender(mut self, on: bool) -> Self {
        self.echo_to_sender = on;
        self
    }

    /// Run until the queue closes or `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(echo_to_sender = self.echo_to_sender, "fan-out dispatcher started");
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.drain.dequeue() => next,
            };
            let Some(item) = next else { break };
            self.dispatch(item).await;
        }
        tracing::info!("fan-out dispatcher stopped");
    }

    /// One dispatch cycle.
    pub async fn dispatch(&self, item: Broadcast) -> DispatchSummary {
        let started = Instant::now();
        let Broadcast { origin, message } = item;
        let exclude = if self.echo_to_sender { None } else { Some(&origin) };

        let mut futs = FuturesUnordered::new();
        self.registry.for_each_except(exclude, |id, sink| {
            let id = id.clone();
            let sink = Arc::clone(sink);
            let msg = &message;
            futs.push(async move {
                let res = sink.deliver(msg).await;
                (id, sink, res)
            });
        });

        let mut summary = DispatchSummary::default();
        while let Some((id, sink, res)) = futs.next().await {
            match res {
                Ok(()) => {
                    summary.delivered += 1;
                    self.metrics.deliveries.inc(&[("outcome", "ok")]);
                }
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.deliveries.inc(&[("outcome", "failed")]);
                    // a session that closed after the snapshot has already left
                    if !self.registry.unregister(&id) {
                        tracing::debug!(recipient = %id, error = %e, "delivery to departed recipient failed");
                        continue;
                    }
                    let reason = match &e {
                        RelayError::DeliveryFailure(r) => *r,
                        _ => "error",
                    };
                    self.metrics.evictions.inc(&[("reason", reason)]);
                    tracing::warn!(recipient = %id, error = %e, "delivery failed, evicted recipient");
                    sink.close();
                }
            }
        }

        self.metrics.fanout_duration.observe(&[], started.elapsed());
        tracing::debug!(
            origin = %origin,
            delivered = summary.delivered,
            failed = summary.failed,
            "dispatch cycle complete"
        );
        summary
    }
}
