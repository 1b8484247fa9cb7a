use std::sync::Arc;

use chatrelay_core::Clock;

use crate::obs::RelayMetrics;
use crate::realtime::core::{BroadcastQueue, ConnectionRegistry, FanoutDispatcher};

/// Handles every session needs. Cheap to clone; one set per relay instance.
#[derive(Clone)]
pub struct RelayCtx {
    pub registry: Arc<ConnectionRegistry>,
    pub queue: BroadcastQueue,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<RelayMetrics>,
}

impl RelayCtx {
    /// Build an independent relay: fresh registry, a queue of
    /// `queue_capacity`, and the dispatcher that drains it. The caller is
    /// responsible for spawning `FanoutDispatcher::run`.
    pub fn build(
        queue_capacity: usize,
        clock: Arc<dyn Clock>,
        metrics: Arc<RelayMetrics>,
    ) -> (RelayCtx, FanoutDispatcher) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (queue, drain) = BroadcastQueue::bounded(queue_capacity);
        let dispatcher = FanoutDispatcher::new(Arc::clone(&registry), drain, Arc::clone(&metrics));
        let ctx = RelayCtx {
            registry,
            queue,
            clock,
            metrics,
        };
        (ctx, dispatcher)
    }
}
