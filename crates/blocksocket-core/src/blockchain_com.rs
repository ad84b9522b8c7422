//! blockchain.com inventory feed.
//!
//! Outbound: `{"op":"ping_block"}`, `{"op":"blocks_sub"}`, `{"op":"blocks_unsub"}`.
//! Inbound block notification: `{"op":"block","x":{"height":..,"hash":..}}`.

use crate::provider::{block_fields, parse_object};
use crate::{Frame, ParseError, ProviderProtocol, SubscriptionMessage};
use serde_json::{Value, json};

/// Public endpoint of the blockchain.com feed.
pub const BLOCKCHAIN_COM_URL: &str = "wss://ws.blockchain.info/inv";

/// The blockchain.com protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockchainCom;

fn op(name: &str) -> SubscriptionMessage {
    SubscriptionMessage::new(json!({ "op": name }))
}

impl ProviderProtocol for BlockchainCom {
    fn name(&self) -> &'static str {
        "blockchain.com"
    }

    fn default_url(&self) -> &'static str {
        BLOCKCHAIN_COM_URL
    }

    fn latest_block_request(&self) -> Option<SubscriptionMessage> {
        Some(op("ping_block"))
    }

    fn subscribe_request(&self) -> SubscriptionMessage {
        op("blocks_sub")
    }

    fn unsubscribe_request(&self) -> SubscriptionMessage {
        op("blocks_unsub")
    }

    fn decode(&self, raw: &str) -> Result<Frame, ParseError> {
        let frame = parse_object(raw)?;
        let op = frame.get("op").and_then(Value::as_str).unwrap_or_default();
        if op != "block" {
            return Ok(Frame::Other(op.to_string()));
        }

        match frame.get("x") {
            Some(x @ Value::Object(_)) => block_fields(x, "hash").map(Frame::Block),
            Some(_) => Err(ParseError::InvalidField("x")),
            None => Err(ParseError::MissingField("x")),
        }
    }
}
