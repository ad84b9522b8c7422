//! mempool.space websocket API.
//!
//! There is no "latest block" request: the server pushes its recent blocks as
//! `{"blocks":[...]}` right after `want blocks`, then one `{"block":{...}}` per
//! newly mined block. Block hashes are under `id`.

use crate::provider::{block_fields, parse_object};
use crate::{Frame, LatestBlock, ParseError, ProviderProtocol, SubscriptionMessage};
use serde_json::{Value, json};

/// Public endpoint of the mempool.space feed.
pub const MEMPOOL_SPACE_URL: &str = "wss://mempool.space/api/v1/ws";

/// The mempool.space protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct MempoolSpace;

impl ProviderProtocol for MempoolSpace {
    fn name(&self) -> &'static str {
        "mempool.space"
    }

    fn default_url(&self) -> &'static str {
        MEMPOOL_SPACE_URL
    }

    fn latest_block_request(&self) -> Option<SubscriptionMessage> {
        None
    }

    fn subscribe_request(&self) -> SubscriptionMessage {
        SubscriptionMessage::new(json!({ "action": "want", "data": ["blocks"] }))
    }

    fn unsubscribe_request(&self) -> SubscriptionMessage {
        SubscriptionMessage::new(json!({ "action": "want", "data": [] }))
    }

    fn keepalive_message(&self) -> Option<SubscriptionMessage> {
        Some(SubscriptionMessage::new(json!({ "action": "ping" })))
    }

    fn decode(&self, raw: &str) -> Result<Frame, ParseError> {
        let frame = parse_object(raw)?;

        if let Some(block) = frame.get("block") {
            return block_fields(block, "id").map(Frame::Block);
        }

        if let Some(blocks) = frame.get("blocks") {
            let blocks = blocks.as_array().ok_or(ParseError::InvalidField("blocks"))?;
            let newest = blocks
                .iter()
                .filter_map(|b| block_fields(b, "id").ok())
                .max_by_key(LatestBlock::height);
            return Ok(newest.map_or_else(|| Frame::Other("blocks".into()), Frame::Block));
        }

        let kinds: Vec<&str> = frame.keys().map(String::as_str).collect();
        Ok(Frame::Other(kinds.join(",")))
    }
}
