//! Peer endpoint records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{parse_payload, require, strip_keys, ExtensionBag};
use crate::validation::ValidationError;

/// Provisioned tunnel type, registered through the peer-provisioning client.
pub const WARP: &str = "warp";

/// Plain tunnel-peer type.
pub const WIREGUARD: &str = "wireguard";

/// A peer-to-peer tunnel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: String,

    pub tag: String,

    /// Provisioning-derived secrets (device id, access token, license).
    #[serde(default)]
    pub ext: ExtensionBag,

    #[serde(flatten)]
    pub options: ExtensionBag,
}

impl Endpoint {
    pub fn from_payload(payload: Value) -> Result<Self, ValidationError> {
        let mut endpoint: Endpoint = parse_payload("endpoint", payload)?;
        strip_keys(&mut endpoint.options, &["ext"]);
        require("endpoint type", &endpoint.kind)?;
        require("endpoint tag", &endpoint.tag)?;
        Ok(endpoint)
    }

    /// Whether this endpoint carries a peer list.
    pub fn is_peer_type(&self) -> bool {
        self.kind == WIREGUARD || self.kind == WARP
    }

    pub fn is_provisioned(&self) -> bool {
        self.kind == WARP
    }

    /// `license_key` held in `ext`, empty when unset.
    pub fn license_key(&self) -> &str {
        self.ext
            .get("license_key")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Core view. Provisioned endpoints are plain tunnels to the core, and
    /// `ext` secrets never leave the store.
    pub fn to_config(&self) -> Value {
        let mut config = self.options.clone();
        let kind = match self.kind.as_str() {
            WARP => WIREGUARD,
            other => other,
        };
        config.insert("type".into(), Value::String(kind.to_string()));
        config.insert("tag".into(), Value::String(self.tag.clone()));
        Value::Object(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_warp_serializes_as_wireguard() {
        let mut endpoint = Endpoint::from_payload(json!({
            "type": "warp",
            "tag": "w1",
            "ext": {"license_key": "abc"},
            "mtu": 1280,
        }))
        .unwrap();
        endpoint.ext.insert("access_token".into(), json!("secret"));

        let config = endpoint.to_config();
        assert_eq!(config["type"], "wireguard");
        assert_eq!(config["mtu"], 1280);
        assert!(config.get("ext").is_none());
        assert_eq!(endpoint.license_key(), "abc");
    }
}
