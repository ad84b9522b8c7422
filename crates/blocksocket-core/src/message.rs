//! Outbound control messages.

use serde::Serialize;
use std::fmt;

/// A provider control message (subscribe, unsubscribe, ...).
///
/// Every provider sends a fixed JSON template per message kind; there are no
/// dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubscriptionMessage(serde_json::Value);

impl SubscriptionMessage {
    /// Wrap a JSON payload.
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    /// The JSON payload.
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }

    /// Serialize to the text frame sent over the wire.
    pub fn to_text(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for SubscriptionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
