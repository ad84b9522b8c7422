//! Live subscription to newly mined blocks.
//!
//! [`BlockSocket`] keeps one connection to a block provider, subscribes to its
//! new-block feed and republishes the most recent block:
//!
//! ```no_run
//! use blocksocket_client::{BlockSocket, SocketEvent};
//! use blocksocket_core::ProviderSource;
//!
//! # async fn run() -> Result<(), blocksocket_client::ClientError> {
//! let socket = BlockSocket::new(ProviderSource::BlockchainCom);
//! let mut events = socket.subscribe();
//! socket.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let SocketEvent::NewBlock(block) = event {
//!         println!("new block {block}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod error;
mod keepalive;
mod manager;
mod ws;

pub use channel::{Channel, ChannelError, ChannelEvent, ChannelSink, Connector};
pub use config::ClientConfig;
pub use error::ClientError;
pub use manager::{BlockSocket, SocketEvent};
pub use ws::WsConnector;
