//! Client credentials and connection descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{parse_payload, require, ExtensionBag};
use crate::validation::ValidationError;

/// Origin of descriptors generated from linked inbounds.
pub const LOCAL_ORIGIN: &str = "local";

fn enabled() -> bool {
    true
}

/// A connection descriptor attached to a client.
///
/// Descriptors with an origin other than [`LOCAL_ORIGIN`] are supplied by
/// users and must round-trip untouched, including unknown keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub remark: String,

    #[serde(rename = "type", default)]
    pub origin: String,

    #[serde(default)]
    pub uri: String,

    #[serde(flatten)]
    pub extra: ExtensionBag,
}

impl Descriptor {
    pub fn local(remark: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            remark: remark.into(),
            origin: LOCAL_ORIGIN.to_string(),
            uri: uri.into(),
            extra: ExtensionBag::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == LOCAL_ORIGIN
    }
}

/// A proxy user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub id: i64,

    #[serde(default = "enabled")]
    pub enable: bool,

    pub name: String,

    #[serde(default)]
    pub desc: String,

    #[serde(default)]
    pub group: String,

    /// Linked inbound ids, in the order the user declared them.
    #[serde(default)]
    pub inbounds: Vec<i64>,

    #[serde(default)]
    pub links: Vec<Descriptor>,

    /// Protocol credentials keyed by protocol (e.g. `{"vless": {"uuid": ..}}`).
    #[serde(default)]
    pub config: ExtensionBag,

    /// Uploaded bytes.
    #[serde(default)]
    pub up: i64,

    /// Downloaded bytes.
    #[serde(default)]
    pub down: i64,

    /// Byte cap; 0 means unlimited.
    #[serde(default)]
    pub volume: i64,

    /// Unix seconds; 0 means never.
    #[serde(default)]
    pub expiry: i64,
}

impl Client {
    pub fn from_payload(payload: Value) -> Result<Self, ValidationError> {
        let client: Client = parse_payload("client", payload)?;
        require("client name", &client.name)?;
        Ok(client)
    }

    /// Credential object for a protocol key.
    pub fn credential(&self, key: &str) -> Option<&ExtensionBag> {
        self.config.get(key).and_then(Value::as_object)
    }

    /// Whether the client should be disabled by the depletion sweep at `now`.
    pub fn is_depleted(&self, now: i64) -> bool {
        let over_quota = self.volume > 0 && self.up + self.down > self.volume;
        let expired = self.expiry > 0 && self.expiry < now;
        over_quota || expired
    }
}
