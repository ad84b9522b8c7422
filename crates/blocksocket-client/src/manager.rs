//! Connection manager for a live block subscription.
//!
//! [`BlockSocket`] is a cheap handle. The state machine runs in a background
//! task that owns the channel and the keepalive timer, so commands, channel
//! events and heartbeats are all applied one at a time:
//!
//! ```text
//! Disconnected --connect()--> Connecting --Opened--> Connected
//!      ^                          |                    |    |
//!      +------ error / closed ----+-- error / closed --+    |
//!      +------------------ Disconnecting <-- disconnect() --+
//! ```
//!
//! `ReconnectSuggested` from the channel re-enters `Connecting` on its own.
//! Every other disconnect stays down until the consumer calls `connect()`.

use crate::channel::{Channel, ChannelError, ChannelEvent, Connector};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::keepalive::{self, KeepAlive};
use crate::ws::WsConnector;
use blocksocket_core::{
    ConnectionState, Frame, LatestBlock, ProviderProtocol, ProviderSource, SubscriptionMessage,
};
use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Sleep;

const COMMAND_BUFFER: usize = 16;

/// Notification published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// A new latest block replaced the previous one.
    NewBlock(LatestBlock),
    /// The channel failed.
    ///
    /// [`BlockSocket::state`] already reads `Disconnected` when this arrives;
    /// the matching `StateChanged(Disconnected)` follows it.
    Error(ChannelError),
}

enum Command {
    Connect {
        reply_tx: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        reply_tx: oneshot::Sender<()>,
    },
}

/// Handle to a connection manager.
///
/// Reusable: `connect()` may be called again after any disconnect. Dropping
/// every clone of the handle disconnects and stops the background task.
#[derive(Clone)]
pub struct BlockSocket {
    source: ProviderSource,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    latest_rx: watch::Receiver<Option<LatestBlock>>,
    events_tx: broadcast::Sender<SocketEvent>,
}

impl BlockSocket {
    /// Manager for `source` over WebSocket with default settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: ProviderSource) -> Self {
        Self::with_config(source, ClientConfig::default())
    }

    pub fn with_config(source: ProviderSource, config: ClientConfig) -> Self {
        Self::with_connector(source, config, WsConnector)
    }

    /// Manager using a custom transport.
    pub fn with_connector(
        source: ProviderSource,
        config: ClientConfig,
        connector: impl Connector,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (latest_tx, latest_rx) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(config.event_capacity());

        let actor = ConnectionActor {
            protocol: source.protocol(),
            source: source.clone(),
            config,
            connector: Arc::new(connector),
            cmd_rx,
            state_tx,
            latest_tx,
            events_tx: events_tx.clone(),
            connecting: None,
            connect_deadline: None,
            channel: None,
            keepalive: None,
        };
        tokio::spawn(actor.run());

        Self {
            source,
            cmd_tx,
            state_rx,
            latest_rx,
            events_tx,
        }
    }

    /// Start connecting.
    ///
    /// Returns once the manager is `Connecting`; progress is reported through
    /// [`Self::subscribe`] and [`Self::watch_state`]. A no-op unless the
    /// manager is `Disconnected`.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.source.url()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { reply_tx })
            .await
            .map_err(|_| ClientError::Stopped)?;
        reply_rx.await.map_err(|_| ClientError::Stopped)?
    }

    /// Unsubscribe and close the channel.
    ///
    /// Returns once the channel and keepalive timer are released. An
    /// in-flight connect is aborted. A no-op when already `Disconnected`.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect { reply_tx })
            .await
            .map_err(|_| ClientError::Stopped)?;
        reply_rx.await.map_err(|_| ClientError::Stopped)
    }

    /// The most recent block received, if any.
    pub fn latest_block(&self) -> Option<LatestBlock> {
        self.latest_rx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn source(&self) -> &ProviderSource {
        &self.source
    }

    /// Watch the latest block.
    pub fn watch_latest(&self) -> watch::Receiver<Option<LatestBlock>> {
        self.latest_rx.clone()
    }

    /// Watch the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Receive every state change, new block and channel error from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.events_tx.subscribe()
    }

    /// Wait until the manager reaches `state`.
    pub async fn wait_for(&self, state: ConnectionState) -> Result<(), ClientError> {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Stopped)
    }
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Channel, ChannelError>> + Send>>;

/// Owns the channel, the keepalive timer and the published state.
struct ConnectionActor {
    source: ProviderSource,
    protocol: &'static dyn ProviderProtocol,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    cmd_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    latest_tx: watch::Sender<Option<LatestBlock>>,
    events_tx: broadcast::Sender<SocketEvent>,
    /// In-flight connect, dropped to abort it.
    connecting: Option<ConnectFuture>,
    /// Bounds the whole connect, from `open()` to the `Opened` event.
    connect_deadline: Option<Pin<Box<Sleep>>>,
    channel: Option<Channel>,
    /// Present only while `Connected`.
    keepalive: Option<KeepAlive>,
}

impl ConnectionActor {
    async fn run(mut self) {
        tracing::debug!("Connection manager for {} started", self.source);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Connect { reply_tx }) => {
                        let _ = reply_tx.send(self.connect());
                    }
                    Some(Command::Disconnect { reply_tx }) => {
                        self.disconnect().await;
                        let _ = reply_tx.send(());
                    }
                    None => {
                        tracing::debug!("All handles dropped; shutting down connection manager");
                        self.disconnect().await;
                        break;
                    }
                },
                result = opening(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_open_result(result);
                }
                () = expired(&mut self.connect_deadline) => {
                    self.connect_deadline = None;
                    let timeout = self.config.connect_timeout();
                    tracing::warn!("No handshake within {:?}", timeout);
                    self.fail(ChannelError::Timeout(timeout));
                }
                event = next_event(&mut self.channel) => {
                    self.on_event(event).await;
                }
                () = keepalive::next_beat(&mut self.keepalive) => {
                    self.heartbeat().await;
                }
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        self.announce(prev, next);
    }

    fn announce(&self, prev: ConnectionState, next: ConnectionState) {
        if prev != next {
            tracing::info!("Connection state {} -> {}", prev, next);
            let _ = self.events_tx.send(SocketEvent::StateChanged(next));
        }
    }

    fn connect(&mut self) -> Result<(), ClientError> {
        let state = self.state();
        if !state.is_disconnected() {
            tracing::debug!("Connect ignored while {}", state);
            return Ok(());
        }

        let url = self.source.url()?.to_string();
        self.start_connect(url);
        Ok(())
    }

    fn start_connect(&mut self, url: String) {
        tracing::info!("Connecting to {} ({})", url, self.protocol.name());

        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout();
        self.connecting = Some(Box::pin(async move {
            tokio::time::timeout(timeout, connector.open(&url, timeout))
                .await
                .unwrap_or(Err(ChannelError::Timeout(timeout)))
        }));
        self.connect_deadline = Some(Box::pin(tokio::time::sleep(timeout)));
        self.set_state(ConnectionState::Connecting);
    }

    fn on_open_result(&mut self, result: Result<Channel, ChannelError>) {
        match result {
            Ok(channel) => {
                tracing::debug!("Channel open, waiting for handshake");
                self.channel = Some(channel);
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}", e);
                self.fail(e);
            }
        }
    }

    async fn on_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Opened) => self.on_opened().await,
            Some(ChannelEvent::Text(text)) => self.on_text(&text),
            Some(ChannelEvent::Closed { code, reason }) => {
                tracing::info!("Channel closed by peer: {} {}", code, reason);
                self.release();
                self.set_state(ConnectionState::Disconnected);
            }
            Some(ChannelEvent::Error(e)) => {
                tracing::warn!("Channel error: {}", e);
                self.fail(e);
            }
            Some(ChannelEvent::ReconnectSuggested) => self.reconnect().await,
            None => {
                tracing::debug!("Channel event stream ended");
                self.release();
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Handshake done: fetch the current tip, subscribe, start the heartbeat.
    async fn on_opened(&mut self) {
        if self.state() != ConnectionState::Connecting {
            tracing::debug!("Ignoring open event outside of Connecting");
            return;
        }
        self.connect_deadline = None;
        self.set_state(ConnectionState::Connected);

        let requests = self
            .protocol
            .latest_block_request()
            .into_iter()
            .chain([self.protocol.subscribe_request()]);
        for request in requests {
            if let Err(e) = self.send(&request).await {
                tracing::warn!("Failed to send {}: {}", request, e);
                self.fail(e);
                return;
            }
        }

        self.keepalive = Some(KeepAlive::start(self.config.keepalive_interval()));
    }

    fn on_text(&mut self, text: &str) {
        if !self.state().is_connected() {
            tracing::debug!("Dropping frame received before handshake");
            return;
        }

        match self.protocol.decode(text) {
            Ok(Frame::Block(block)) => self.publish(block),
            Ok(Frame::Other(kind)) => tracing::debug!("Ignoring non-block message {}", kind),
            Err(e) => tracing::warn!("Discarding malformed frame: {}", e),
        }
    }

    fn publish(&self, block: LatestBlock) {
        tracing::info!("New block {}", block);
        self.latest_tx.send_replace(Some(block.clone()));
        let _ = self.events_tx.send(SocketEvent::NewBlock(block));
    }

    async fn heartbeat(&mut self) {
        let limit = self.config.send_timeout();
        let Some(channel) = self.channel.as_mut() else {
            self.keepalive = None;
            return;
        };

        let result = bounded(limit, keepalive::beat(channel, self.protocol)).await;
        match result {
            Ok(()) => tracing::debug!("Keepalive sent"),
            Err(e) => {
                tracing::warn!("Keepalive failed: {}", e);
                self.fail(e);
            }
        }
    }

    async fn reconnect(&mut self) {
        tracing::info!("Provider suggested reconnect");
        self.close_channel().await;
        self.release();

        match self.source.url() {
            Ok(url) => {
                let url = url.to_string();
                self.start_connect(url);
            }
            Err(e) => {
                tracing::warn!("Cannot reconnect: {}", e);
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    async fn disconnect(&mut self) {
        match self.state() {
            ConnectionState::Disconnected => {
                tracing::debug!("Already disconnected");
                return;
            }
            ConnectionState::Connected => {
                self.set_state(ConnectionState::Disconnecting);
                self.keepalive = None;

                // Best effort: closing goes ahead even if this fails.
                let unsubscribe = self.protocol.unsubscribe_request();
                if let Err(e) = self.send(&unsubscribe).await {
                    tracing::warn!("Failed to send unsubscribe: {}", e);
                }
            }
            ConnectionState::Connecting | ConnectionState::Disconnecting => {
                tracing::info!("Aborting in-flight connect");
            }
        }

        self.close_channel().await;
        self.release();
        self.set_state(ConnectionState::Disconnected);
    }

    async fn send(&mut self, message: &SubscriptionMessage) -> Result<(), ChannelError> {
        let limit = self.config.send_timeout();
        let channel = self.channel.as_mut().ok_or(ChannelError::NotOpen)?;
        bounded(limit, channel.send(message.to_text())).await
    }

    async fn close_channel(&mut self) {
        let limit = self.config.send_timeout();
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = bounded(limit, channel.close()).await {
                tracing::debug!("Channel close failed: {}", e);
            }
        }
    }

    /// Drop the channel, any in-flight connect and the keepalive timer.
    fn release(&mut self) {
        self.keepalive = None;
        self.connecting = None;
        self.connect_deadline = None;
        self.channel = None;
    }

    /// Tear down after a channel failure and report it.
    fn fail(&mut self, error: ChannelError) {
        self.release();
        let prev = self.state_tx.send_replace(ConnectionState::Disconnected);
        let _ = self.events_tx.send(SocketEvent::Error(error));
        self.announce(prev, ConnectionState::Disconnected);
    }
}

async fn opening(connecting: &mut Option<ConnectFuture>) -> Result<Channel, ChannelError> {
    match connecting {
        Some(connect) => connect.as_mut().await,
        None => future::pending().await,
    }
}

async fn expired(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

async fn next_event(channel: &mut Option<Channel>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.next_event().await,
        None => future::pending().await,
    }
}

/// Fail a write that does not complete within `limit`.
async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, ChannelError>>,
) -> Result<T, ChannelError> {
    tokio::time::timeout(limit, op)
        .await
        .unwrap_or_else(|_| Err(ChannelError::SendFailed(format!("timed out after {limit:?}"))))
}
