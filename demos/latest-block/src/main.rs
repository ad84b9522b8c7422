//! Follow the chain tip.
//!
//! Connects to a block provider, logs every new block, reconnects whenever the
//! connection drops and disconnects cleanly on Ctrl-C.
//!
//!   cargo run -p blocksocket-demo-latest-block
//!   cargo run -p blocksocket-demo-latest-block -- --source mempool.space
//!   cargo run -p blocksocket-demo-latest-block -- --source ws://localhost:9000/inv

use blocksocket_client::{BlockSocket, SocketEvent};
use blocksocket_core::{ConnectionState, ProviderSource};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

const RETRY_DELAY: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("latest_block=info".parse()?)
                .add_directive("blocksocket_client=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let source: ProviderSource = match parse_arg(&args, "--source") {
        Some(s) => s.parse()?,
        None => ProviderSource::default(),
    };

    let socket = BlockSocket::new(source);
    let mut events = socket.subscribe();
    socket.connect().await?;
    tracing::info!("Following {}", socket.source());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SocketEvent::NewBlock(block)) => {
                    tracing::info!("Block {} ({})", block.height(), block.hash());
                }
                // Every disconnect seen inside the loop is unrequested.
                Ok(SocketEvent::StateChanged(ConnectionState::Disconnected)) => {
                    tracing::warn!("Connection lost; retrying in {:?}", RETRY_DELAY);
                    tokio::select! {
                        () = tokio::time::sleep(RETRY_DELAY) => socket.connect().await?,
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Shutting down");
                            break;
                        }
                    }
                }
                Ok(SocketEvent::StateChanged(state)) => {
                    tracing::info!("Connection {}", state);
                }
                Ok(SocketEvent::Error(e)) => {
                    tracing::warn!("Connection error: {}", e);
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} events", n);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    socket.disconnect().await?;
    Ok(())
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
