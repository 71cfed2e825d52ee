//! Core document assembly.
//!
//! # Data Flow
//! ```text
//! override or settings["config"] (or the built-in skeleton)
//!     → CoreDocument (log, dns, ntp, route, experimental)
//!     → inbounds  = every inbound  → to_config(tls) + users
//!     → outbounds = every outbound → to_config()
//!     → endpoints = every endpoint → to_config() (warp → wireguard, no ext)
//! ```
//!
//! # Design Decisions
//! - Read-only: assembling never writes, so it can run on a plain
//!   connection or inside a save transaction
//! - The stored arrays of the base document are always replaced, never merged

pub mod users;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::EngineError;
use crate::model::Inbound;
use crate::settings::{CONFIG_KEY, DEFAULT_BASE_DOCUMENT};
use crate::store::{self, StoreResult};

/// The full configuration handed to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntp: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,

    #[serde(default)]
    pub inbounds: Vec<Value>,

    #[serde(default)]
    pub outbounds: Vec<Value>,

    #[serde(default)]
    pub endpoints: Vec<Value>,
}

impl CoreDocument {
    /// Parses a base document. Anything but a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("base document must be a JSON object"));
        }
        serde_json::from_value(value)
    }
}

/// Builds the full document from the stored base and every stored entity.
pub fn assemble(conn: &Connection, base_override: Option<&str>) -> Result<CoreDocument, EngineError> {
    let base = match base_override {
        Some(text) => text.to_string(),
        None => store::settings::get(conn, CONFIG_KEY)?
            .unwrap_or_else(|| DEFAULT_BASE_DOCUMENT.to_string()),
    };
    let mut document = CoreDocument::parse(&base)?;

    document.inbounds = store::inbounds::list(conn)?
        .iter()
        .map(|inbound| inbound_document(conn, inbound))
        .collect::<StoreResult<_>>()?;
    document.outbounds = store::outbounds::list(conn)?
        .iter()
        .map(|outbound| outbound.to_config())
        .collect();
    document.endpoints = store::endpoints::list(conn)?
        .iter()
        .map(|endpoint| endpoint.to_config())
        .collect();

    Ok(document)
}

/// Core view of one inbound: TLS block resolved, users injected.
pub fn inbound_document(conn: &Connection, inbound: &Inbound) -> StoreResult<Value> {
    let tls = match inbound.tls_id {
        Some(id) => {
            let profile = store::tls::get(conn, id)?;
            if profile.is_none() {
                tracing::warn!(tag = %inbound.tag, tls_id = id, "Inbound references a missing TLS profile");
            }
            profile
        }
        None => None,
    };

    let mut config = inbound.to_config(tls.as_ref());
    if let Some(list) = users::inbound_users(conn, inbound, tls.is_some())? {
        users::inject(&mut config, list);
    }
    Ok(config)
}
