//! Outbound route records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{parse_payload, require, ExtensionBag};
use crate::validation::ValidationError;

/// An egress route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "type", default)]
    pub kind: String,

    pub tag: String,

    #[serde(flatten)]
    pub options: ExtensionBag,
}

impl Outbound {
    pub fn from_payload(payload: Value) -> Result<Self, ValidationError> {
        let outbound: Outbound = parse_payload("outbound", payload)?;
        require("outbound tag", &outbound.tag)?;
        if outbound.kind.is_empty() {
            tracing::debug!(tag = %outbound.tag, "Outbound has an empty type");
        }
        Ok(outbound)
    }

    pub fn to_config(&self) -> Value {
        let mut config = self.options.clone();
        config.insert("type".into(), Value::String(self.kind.clone()));
        config.insert("tag".into(), Value::String(self.tag.clone()));
        Value::Object(config)
    }
}
