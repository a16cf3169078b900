//! Wire framing: every inbound/outbound message is `{event, payload}`
//! (spec §6, "Wire protocol").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a> {
    pub event: &'a str,
    pub payload: Value,
}

impl<'a> OutboundFrame<'a> {
    pub fn new(event: &'a str, payload: Value) -> Self {
        Self { event, payload }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"event\":\"error\"}".to_string())
    }
}
