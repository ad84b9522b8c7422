//! Connection heartbeat.

use crate::channel::{Channel, ChannelError};
use blocksocket_core::ProviderProtocol;
use std::future;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Fixed-period heartbeat timer.
///
/// The first beat is due immediately. Dropping the value cancels the timer.
#[derive(Debug)]
pub(crate) struct KeepAlive {
    interval: Interval,
}

impl KeepAlive {
    /// Start beating every `period`.
    pub(crate) fn start(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next beat.
    pub(crate) async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Next beat of `keepalive`, or never if it is stopped.
pub(crate) async fn next_beat(keepalive: &mut Option<KeepAlive>) {
    match keepalive {
        Some(keepalive) => keepalive.tick().await,
        None => future::pending().await,
    }
}

/// Send one heartbeat: the provider's no-op message if it has one, otherwise
/// a transport ping.
pub(crate) async fn beat(
    channel: &mut Channel,
    protocol: &dyn ProviderProtocol,
) -> Result<(), ChannelError> {
    match protocol.keepalive_message() {
        Some(message) => channel.send(message.to_text()).await,
        None => channel.ping().await,
    }
}
