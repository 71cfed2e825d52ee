//! Authenticated-user lists for inbound configs.

use rusqlite::Connection;
use serde_json::Value;

use crate::model::Inbound;
use crate::store::{clients, StoreResult};

/// Flow that requires TLS; stripped from users of plain vless inbounds.
const VISION_FLOW: &str = "xtls-rprx-vision";

/// Shadowtls carries users from protocol version 3 on.
fn shadowtls_has_users(inbound: &Inbound) -> bool {
    match inbound.options.get("version").and_then(Value::as_f64) {
        Some(version) => version >= 3.0,
        None => {
            tracing::warn!(tag = %inbound.tag, "shadowtls version missing, assuming no users");
            false
        }
    }
}

/// Credentials of every enabled client linked to `inbound`, shaped as the
/// core's `users` array.
///
/// `None` when the inbound type takes no users.
pub fn inbound_users(
    conn: &Connection,
    inbound: &Inbound,
    has_tls: bool,
) -> StoreResult<Option<Vec<Value>>> {
    if !inbound.has_users() {
        return Ok(None);
    }
    if inbound.kind == "shadowtls" && !shadowtls_has_users(inbound) {
        return Ok(None);
    }

    let strip_flow = inbound.kind == "vless" && !has_tls;
    let users = clients::credentials(conn, inbound.id, inbound.credential_key())?
        .into_iter()
        .map(|(_, mut credential)| {
            if strip_flow && credential.get("flow").and_then(Value::as_str) == Some(VISION_FLOW) {
                credential.insert("flow".into(), Value::String(String::new()));
            }
            Value::Object(credential)
        })
        .collect();
    Ok(Some(users))
}

/// Inserts `users` into a serialized inbound config.
pub fn inject(config: &mut Value, users: Vec<Value>) {
    if let Value::Object(map) = config {
        map.insert("users".into(), Value::Array(users));
    }
}
