//! WebSocket channel on top of `tokio-tungstenite`.

use crate::channel::{Channel, ChannelError, ChannelEvent, ChannelSink, Connector};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 64;

/// Close frame carried no status code.
const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;

/// Opens `ws://` and `wss://` channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Channel, ChannelError> {
        // Errors only if a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (ws, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| ChannelError::Timeout(timeout))?
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
        tracing::debug!("WebSocket handshake with {} complete", url);

        let (sink, stream) = ws.split();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(read_loop(stream, events_tx));

        Ok(Channel::new(WsSink { sink, reader }, events_rx))
    }
}

/// Forward inbound frames as channel events until the connection ends.
async fn read_loop(mut stream: SplitStream<WsStream>, events: mpsc::Sender<ChannelEvent>) {
    if events.send(ChannelEvent::Opened).await.is_err() {
        return;
    }

    while let Some(message) = stream.next().await {
        let event = match message {
            Ok(Message::Text(text)) => ChannelEvent::Text(text.as_str().to_owned()),
            Ok(Message::Close(frame)) => {
                let _ = events.send(close_event(frame)).await;
                return;
            }
            // Pings are answered by tungstenite; binary frames are not part of any feed.
            Ok(_) => continue,
            Err(e) => {
                let error = ChannelError::Transport(e.to_string());
                let _ = events.send(ChannelEvent::Error(error)).await;
                return;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }

    let _ = events
        .send(ChannelEvent::Closed {
            code: CLOSE_ABNORMAL,
            reason: "connection dropped".into(),
        })
        .await;
}

fn close_event(frame: Option<CloseFrame>) -> ChannelEvent {
    match frame {
        Some(frame) if matches!(frame.code, CloseCode::Restart | CloseCode::Again) => {
            ChannelEvent::ReconnectSuggested
        }
        Some(frame) => ChannelEvent::Closed {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned(),
        },
        None => ChannelEvent::Closed {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
        },
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl ChannelSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), ChannelError> {
        self.sink
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.sink
            .close()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_codes_suggest_reconnect() {
        for code in [CloseCode::Restart, CloseCode::Again] {
            let frame = CloseFrame {
                code,
                reason: "maintenance".into(),
            };
            assert_eq!(close_event(Some(frame)), ChannelEvent::ReconnectSuggested);
        }
    }

    #[test]
    fn other_close_codes_are_reported() {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "bye".into(),
        };
        assert_eq!(
            close_event(Some(frame)),
            ChannelEvent::Closed {
                code: 1001,
                reason: "bye".into()
            }
        );
        assert_eq!(
            close_event(None),
            ChannelEvent::Closed {
                code: CLOSE_NO_STATUS,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn invalid_url_fails_to_connect() {
        let result = WsConnector
            .open("not a url", Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(ChannelError::ConnectFailed(_))));
    }
}
