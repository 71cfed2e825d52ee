//! Inbound listener records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{parse_payload, require, strip_keys, ExtensionBag, TlsProfile};
use crate::validation::ValidationError;

/// Inbound types whose core config carries a `users` list.
const USER_TYPES: &[&str] = &[
    "mixed",
    "socks",
    "http",
    "shadowsocks",
    "vmess",
    "trojan",
    "naive",
    "hysteria",
    "shadowtls",
    "tuic",
    "hysteria2",
    "vless",
];

/// A proxy listener.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(default)]
    pub id: i64,

    /// Protocol tag (e.g. "vless").
    #[serde(rename = "type")]
    pub kind: String,

    /// Unique handle, shared with the live core.
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_id: Option<i64>,

    /// Client-side outbound snapshot derived from this listener.
    #[serde(default, skip_deserializing)]
    pub out_json: ExtensionBag,

    #[serde(flatten)]
    pub options: ExtensionBag,
}

impl Inbound {
    /// Build an inbound from a save payload.
    pub fn from_payload(payload: Value) -> Result<Self, ValidationError> {
        let mut inbound: Inbound = parse_payload("inbound", payload)?;
        strip_keys(&mut inbound.options, &["out_json", "users"]);
        if inbound.tls_id == Some(0) {
            inbound.tls_id = None;
        }
        require("inbound type", &inbound.kind)?;
        require("inbound tag", &inbound.tag)?;
        Ok(inbound)
    }

    /// Whether the core config of this type lists authenticated users.
    pub fn has_users(&self) -> bool {
        USER_TYPES.contains(&self.kind.as_str())
    }

    /// Key of the client credential used by this inbound.
    ///
    /// 128-bit 2022 shadowsocks keys differ in length from the 256-bit ones,
    /// so they are kept under their own credential.
    pub fn credential_key(&self) -> &str {
        match (self.kind.as_str(), self.options.get("method").and_then(Value::as_str)) {
            ("shadowsocks", Some("2022-blake3-aes-128-gcm")) => "shadowsocks16",
            (kind, _) => kind,
        }
    }

    /// Listen port from the extension bag, if present.
    pub fn listen_port(&self) -> Option<u64> {
        self.options.get("listen_port").and_then(Value::as_u64)
    }

    /// Core view: canonical fields over the bag, plus the server TLS block.
    pub fn to_config(&self, tls: Option<&TlsProfile>) -> Value {
        let mut config: Map<String, Value> = self.options.clone();
        config.insert("type".into(), Value::String(self.kind.clone()));
        config.insert("tag".into(), Value::String(self.tag.clone()));
        if let Some(profile) = tls {
            config.insert("tls".into(), profile.server.clone());
        }
        Value::Object(config)
    }
}
