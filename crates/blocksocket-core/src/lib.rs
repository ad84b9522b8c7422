//! Core types for live block subscriptions.
//!
//! This crate knows how to talk to each block provider (endpoint, control
//! messages, notification parsing) but owns no sockets. The connection itself
//! is driven by `blocksocket-client`.

mod block;
mod blockchain_com;
mod mempool_space;
mod message;
mod provider;

pub use block::LatestBlock;
pub use blockchain_com::{BLOCKCHAIN_COM_URL, BlockchainCom};
pub use mempool_space::{MEMPOOL_SPACE_URL, MempoolSpace};
pub use message::SubscriptionMessage;
pub use provider::{ConfigError, Frame, ParseError, ProviderProtocol, ProviderSource};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No channel is open.
    #[default]
    Disconnected,
    /// A channel is being opened.
    Connecting,
    /// Channel open and subscribed.
    Connected,
    /// Unsubscribing and closing.
    Disconnecting,
}

impl ConnectionState {
    /// Check if the manager is subscribed and receiving blocks.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if no channel is open or being opened.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}
