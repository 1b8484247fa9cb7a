//! Shared application state for the chat relay gateway.
//!
//! Owns one relay instance (registry + queue + metrics) and the process
//! shutdown token. Building the state also yields the fan-out dispatcher,
//! which the caller spawns.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chatrelay_core::error::Result;
use chatrelay_core::{Clock, SystemClock};

use crate::config::GatewayConfig;
use crate::obs::RelayMetrics;
use crate::realtime::{ConnectionRegistry, FanoutDispatcher, RelayCtx};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    relay: RelayCtx,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build application state with the wall clock.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn build(cfg: GatewayConfig) -> Result<(Self, FanoutDispatcher)> {
        Self::build_with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn build_with_clock(cfg: GatewayConfig, clock: Arc<dyn Clock>) -> Result<(Self, FanoutDispatcher)> {
        cfg.validate()?;

        let metrics = Arc::new(RelayMetrics::default());
        let (relay, dispatcher) = RelayCtx::build(cfg.relay.queue_capacity, clock, metrics);
        let dispatcher = dispatcher.echo_to_sender(cfg.relay.echo_to_sender);

        tracing::info!(
            queue_capacity = relay.queue.capacity(),
            outbound_buffer = cfg.relay.outbound_buffer,
            send_timeout_ms = cfg.relay.send_timeout_ms,
            "relay initialised"
        );

        let state = Self {
            inner: Arc::new(AppStateInner {
                cfg,
                relay,
                shutdown: CancellationToken::new(),
            }),
        };
        Ok((state, dispatcher))
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn relay(&self) -> RelayCtx {
        self.inner.relay.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.inner.relay.registry)
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.inner.relay.metrics)
    }

    /// Parent of every connection token; cancelling it ends all sessions.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Stop accepting connections and wake every session.
    pub fn begin_shutdown(&self) {
        self.inner.relay.metrics.set_draining();
        self.inner.shutdown.cancel();
    }

    pub fn is_draining(&self) -> bool {
        self.inner.relay.metrics.is_draining()
    }

    /// Gauges computed at scrape time.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let relay = &self.inner.relay;
        let queued = relay.queue.capacity().saturating_sub(relay.queue.available());
        vec![
            ("chatrelay_registry_size", relay.registry.len() as u64),
            ("chatrelay_queue_depth", queued as u64),
        ]
    }
}
