use std::time::Duration;

use serde::Deserialize;
use chatrelay_core::error::{RelayError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub relay: RelaySection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            relay: RelaySection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.gateway.validate()?;
        self.relay.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120_000).contains(&self.ping_interval_ms) {
            return Err(RelayError::Config(
                "gateway.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(2000..=600_000).contains(&self.idle_timeout_ms) {
            return Err(RelayError::Config(
                "gateway.idle_timeout_ms must be between 2000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(RelayError::Config(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(64..=1_048_576).contains(&self.max_frame_bytes) {
            return Err(RelayError::Config(
                "gateway.max_frame_bytes must be between 64 and 1048576".into(),
            ));
        }
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    /// Broadcast queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-connection outbound buffer.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// How long one recipient may stall a dispatch cycle.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default)]
    pub echo_to_sender: bool,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            outbound_buffer: default_outbound_buffer(),
            send_timeout_ms: default_send_timeout_ms(),
            echo_to_sender: false,
        }
    }
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65_536).contains(&self.queue_capacity) {
            return Err(RelayError::Config(
                "relay.queue_capacity must be between 1 and 65536".into(),
            ));
        }
        if !(1..=65_536).contains(&self.outbound_buffer) {
            return Err(RelayError::Config(
                "relay.outbound_buffer must be between 1 and 65536".into(),
            ));
        }
        if !(1..=60_000).contains(&self.send_timeout_ms) {
            return Err(RelayError::Config(
                "relay.send_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_max_frame_bytes() -> usize {
    4096
}
fn default_queue_capacity() -> usize {
    100
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_send_timeout_ms() -> u64 {
    1500
}
