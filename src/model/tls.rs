//! TLS profiles shared by inbounds.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{parse_payload, require};
use crate::validation::ValidationError;

fn empty_object() -> Value {
    json!({})
}

/// Certificate material and client-side TLS hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsProfile {
    #[serde(default)]
    pub id: i64,

    pub name: String,

    /// Injected as the `tls` block of linked inbounds.
    #[serde(default = "empty_object")]
    pub server: Value,

    /// Used when deriving client outbounds and links.
    #[serde(default = "empty_object")]
    pub client: Value,
}

impl TlsProfile {
    pub fn from_payload(payload: Value) -> Result<Self, ValidationError> {
        let profile: TlsProfile = parse_payload("tls", payload)?;
        require("tls name", &profile.name)?;
        Ok(profile)
    }
}
