//! Client configuration.

use serde::Deserialize;
use std::time::Duration;

/// Timeouts and buffer sizes for a [`crate::BlockSocket`].
///
/// Every field has a default, so the struct can be embedded in an
/// application's own config file and only the overrides spelled out.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Seconds to wait for the connection handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a single write (control message, ping, close).
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// Seconds between heartbeats while connected.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Buffered notifications per event subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_send_timeout_secs() -> u64 {
    5
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_event_capacity() -> usize {
    64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Heartbeat period, never shorter than one second.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }

    pub(crate) fn event_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
