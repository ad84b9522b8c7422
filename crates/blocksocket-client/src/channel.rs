//! Bidirectional text-message channel.
//!
//! A [`Connector`] opens a [`Channel`]: a write half ([`ChannelSink`]) plus an
//! ordered stream of [`ChannelEvent`]s read from the transport. The manager
//! only ever talks to this abstraction, so tests can swap in an in-memory
//! transport.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something that happened on the transport, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The handshake completed; the channel accepts writes.
    Opened,
    /// A text frame arrived.
    Text(String),
    /// The peer closed the connection.
    Closed { code: u16, reason: String },
    /// The transport failed.
    Error(ChannelError),
    /// The peer asked us to come back on a fresh connection.
    ReconnectSuggested,
}

/// Channel-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel is not open")]
    NotOpen,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Opens channels.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a channel to `url`, giving up after `timeout`.
    async fn open(&self, url: &str, timeout: Duration) -> Result<Channel, ChannelError>;
}

/// Write half of a channel.
#[async_trait]
pub trait ChannelSink: Send {
    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), ChannelError>;

    /// Write a transport-level ping. `Ok` means the ping went out.
    async fn ping(&mut self) -> Result<(), ChannelError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// An open channel.
pub struct Channel {
    sink: Box<dyn ChannelSink>,
    events: mpsc::Receiver<ChannelEvent>,
    closed: bool,
}

impl Channel {
    /// Assemble a channel from its write half and event stream.
    pub fn new(sink: impl ChannelSink + 'static, events: mpsc::Receiver<ChannelEvent>) -> Self {
        Self {
            sink: Box::new(sink),
            events,
            closed: false,
        }
    }

    /// Write one text frame. Fails with [`ChannelError::NotOpen`] after `close`.
    pub async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::NotOpen);
        }
        self.sink.send(text).await
    }

    /// Write a transport-level ping.
    pub async fn ping(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::NotOpen);
        }
        self.sink.ping().await
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink.close().await
    }

    /// Next transport event, or `None` once the transport has gone away.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}
