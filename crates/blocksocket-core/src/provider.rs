//! Provider selection and the protocol contract every provider implements.
//!
//! Providers are a small closed set. [`ProviderSource`] is the tag chosen by
//! the application; [`ProviderSource::protocol`] looks up the matching
//! [`ProviderProtocol`] implementation.

use crate::{
    BLOCKCHAIN_COM_URL, BlockchainCom, LatestBlock, MEMPOOL_SPACE_URL, MempoolSpace,
    SubscriptionMessage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Per-provider wire contract: endpoint, control messages and parser.
///
/// Implementations are stateless.
pub trait ProviderProtocol: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Public endpoint of the provider.
    fn default_url(&self) -> &'static str;

    /// Request for the most recent block, if the provider supports one.
    fn latest_block_request(&self) -> Option<SubscriptionMessage>;

    /// Start the push feed of new blocks.
    fn subscribe_request(&self) -> SubscriptionMessage;

    /// Stop the push feed of new blocks.
    fn unsubscribe_request(&self) -> SubscriptionMessage;

    /// Application-level no-op used as a heartbeat.
    ///
    /// `None` means the transport's own ping frame is used instead.
    fn keepalive_message(&self) -> Option<SubscriptionMessage> {
        None
    }

    /// Classify an inbound text frame.
    fn decode(&self, raw: &str) -> Result<Frame, ParseError>;

    /// Extract a block from an inbound text frame.
    ///
    /// Malformed frames and non-block messages both yield `None`.
    fn parse(&self, raw: &str) -> Option<LatestBlock> {
        match self.decode(raw) {
            Ok(Frame::Block(block)) => Some(block),
            _ => None,
        }
    }
}

/// A successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A block notification.
    Block(LatestBlock),
    /// Anything else (pong, other feeds). Carries the message kind for logging.
    Other(String),
}

/// Which provider a connection talks to. Fixed for the lifetime of a manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSource {
    /// blockchain.com inventory feed.
    #[default]
    BlockchainCom,
    /// mempool.space websocket API.
    MempoolSpace,
    /// A blockchain.com-compatible feed at a caller-supplied URL.
    Custom(String),
}

impl ProviderSource {
    /// Endpoint to connect to.
    pub fn url(&self) -> Result<&str, ConfigError> {
        match self {
            Self::BlockchainCom => Ok(BLOCKCHAIN_COM_URL),
            Self::MempoolSpace => Ok(MEMPOOL_SPACE_URL),
            Self::Custom(url) if url.trim().is_empty() => Err(ConfigError::MissingCustomUrl),
            Self::Custom(url) => Ok(url.trim()),
        }
    }

    /// Protocol implementation for this source.
    pub fn protocol(&self) -> &'static dyn ProviderProtocol {
        match self {
            Self::BlockchainCom | Self::Custom(_) => &BlockchainCom,
            Self::MempoolSpace => &MempoolSpace,
        }
    }
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockchainCom => f.write_str("blockchain.com"),
            Self::MempoolSpace => f.write_str("mempool.space"),
            Self::Custom(url) => write!(f, "custom:{url}"),
        }
    }
}

impl FromStr for ProviderSource {
    type Err = ConfigError;

    /// Accepts `blockchain.com`, `mempool.space`, or a `ws://`/`wss://` URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConfigError::MissingCustomUrl),
            "blockchain.com" | "blockchain_com" => Ok(Self::BlockchainCom),
            "mempool.space" | "mempool_space" => Ok(Self::MempoolSpace),
            url if url.starts_with("ws://") || url.starts_with("wss://") => {
                Ok(Self::Custom(url.to_string()))
            }
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Invalid provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("custom provider source requires a URL")]
    MissingCustomUrl,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// An inbound frame that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    InvalidField(&'static str),
    #[error("block hash is empty")]
    EmptyHash,
}

/// Decode `raw` and require a top-level JSON object.
pub(crate) fn parse_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Read `height` and the hash stored under `hash_key` from a block object.
pub(crate) fn block_fields(
    value: &Value,
    hash_key: &'static str,
) -> Result<LatestBlock, ParseError> {
    let height = value
        .get("height")
        .ok_or(ParseError::MissingField("height"))?
        .as_u64()
        .ok_or(ParseError::InvalidField("height"))?;
    let hash = value
        .get(hash_key)
        .ok_or(ParseError::MissingField(hash_key))?
        .as_str()
        .ok_or(ParseError::InvalidField(hash_key))?;

    if hash.is_empty() {
        return Err(ParseError::EmptyHash);
    }

    Ok(LatestBlock::new(height, hash))
}
