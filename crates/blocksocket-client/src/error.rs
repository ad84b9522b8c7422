//! Errors returned by [`crate::BlockSocket`] calls.

use blocksocket_core::ConfigError;

/// Failure of a consumer call.
///
/// Connection problems are not returned here; they arrive as
/// [`crate::SocketEvent::Error`] because they happen after the call returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("connection manager has stopped")]
    Stopped,
}
