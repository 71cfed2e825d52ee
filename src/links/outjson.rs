//! Client-side outbound snapshots of inbounds.

use serde_json::{json, Map, Value};

use crate::model::{ExtensionBag, Inbound, TlsProfile};

/// Listen addresses that mean "every interface"; clients must dial the
/// configured public hostname instead.
const WILDCARD_LISTEN: &[&str] = &["", "0.0.0.0", "::", "[::]"];

fn copy(from: &ExtensionBag, to: &mut ExtensionBag, keys: &[&str]) {
    for key in keys {
        if let Some(value) = from.get(*key) {
            to.insert((*key).to_string(), value.clone());
        }
    }
}

fn client_tls(profile: &TlsProfile) -> Value {
    let mut tls = match &profile.client {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    tls.insert("enabled".into(), Value::Bool(true));
    if !tls.contains_key("server_name") {
        if let Some(name) = profile.server.get("server_name") {
            tls.insert("server_name".into(), name.clone());
        }
    }
    if let Some(reality) = profile.server.get("reality").filter(|r| r["enabled"] == true) {
        let mut client_reality = match tls.get("reality") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        client_reality.insert("enabled".into(), Value::Bool(true));
        if !client_reality.contains_key("short_id") {
            if let Some(short_id) = reality.get("short_id").and_then(|ids| ids.get(0)) {
                client_reality.insert("short_id".into(), short_id.clone());
            }
        }
        tls.insert("reality".into(), Value::Object(client_reality));
    }
    Value::Object(tls)
}

/// Builds the outbound a client would use to reach `inbound`.
///
/// Inbounds that cannot carry users yield an empty snapshot.
pub fn build_out_json(inbound: &Inbound, tls: Option<&TlsProfile>, hostname: &str) -> ExtensionBag {
    let mut out = ExtensionBag::new();
    if !inbound.has_users() {
        return out;
    }
    let options = &inbound.options;

    let kind = match inbound.kind.as_str() {
        "mixed" => "socks",
        other => other,
    };
    out.insert("type".into(), json!(kind));
    out.insert("tag".into(), json!(inbound.tag));

    let server = match options.get("listen").and_then(Value::as_str) {
        Some(listen) if !WILDCARD_LISTEN.contains(&listen) => listen,
        _ => hostname,
    };
    out.insert("server".into(), json!(server));
    if let Some(port) = inbound.listen_port() {
        out.insert("server_port".into(), json!(port));
    }

    if let Some(profile) = tls {
        out.insert("tls".into(), client_tls(profile));
    }

    copy(options, &mut out, &["transport"]);
    if let Some(mux) = options.get("multiplex").filter(|m| m["enabled"] == true) {
        let mut client_mux = json!({"enabled": true});
        if let Some(padding) = mux.get("padding") {
            client_mux["padding"] = padding.clone();
        }
        out.insert("multiplex".into(), client_mux);
    }

    match inbound.kind.as_str() {
        "shadowsocks" => {
            copy(options, &mut out, &["method"]);
            let is_2022 = options
                .get("method")
                .and_then(Value::as_str)
                .is_some_and(|m| m.starts_with("2022"));
            if is_2022 {
                // Multi-user 2022 ciphers prefix the user key with the server key.
                copy(options, &mut out, &["password"]);
            }
        }
        "hysteria" | "hysteria2" => {
            // Server upload is client download.
            if let Some(up) = options.get("up_mbps") {
                out.insert("down_mbps".into(), up.clone());
            }
            if let Some(down) = options.get("down_mbps") {
                out.insert("up_mbps".into(), down.clone());
            }
            copy(options, &mut out, &["obfs", "recv_window_conn", "disable_mtu_discovery"]);
        }
        "tuic" => copy(options, &mut out, &["congestion_control", "zero_rtt_handshake", "heartbeat"]),
        "shadowtls" => copy(options, &mut out, &["version"]),
        _ => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(payload: Value) -> Inbound {
        Inbound::from_payload(payload).unwrap()
    }

    #[test]
    fn test_wildcard_listen_uses_hostname() {
        let vless = inbound(json!({
            "type": "vless", "tag": "in1", "listen": "::", "listen_port": 443,
            "transport": {"type": "ws", "path": "/ws"},
        }));
        let out = build_out_json(&vless, None, "proxy.example.com");
        assert_eq!(out["server"], "proxy.example.com");
        assert_eq!(out["server_port"], 443);
        assert_eq!(out["transport"]["path"], "/ws");
        assert!(out.get("tls").is_none());

        let pinned = inbound(json!({"type": "trojan", "tag": "t", "listen": "10.1.1.1"}));
        assert_eq!(build_out_json(&pinned, None, "h")["server"], "10.1.1.1");
    }

    #[test]
    fn test_tls_client_block_inherits_server_name() {
        let profile = TlsProfile {
            id: 1,
            name: "main".into(),
            server: json!({
                "enabled": true,
                "server_name": "example.com",
                "reality": {"enabled": true, "short_id": ["abcd"]},
            }),
            client: json!({"utls": {"enabled": true, "fingerprint": "chrome"}, "reality": {"public_key": "PUB"}}),
        };
        let out = build_out_json(&inbound(json!({"type": "vless", "tag": "in1"})), Some(&profile), "h");
        let tls = &out["tls"];
        assert_eq!(tls["enabled"], true);
        assert_eq!(tls["server_name"], "example.com");
        assert_eq!(tls["utls"]["fingerprint"], "chrome");
        assert_eq!(tls["reality"]["public_key"], "PUB");
        assert_eq!(tls["reality"]["short_id"], "abcd");
    }

    #[test]
    fn test_hysteria_bandwidth_is_swapped() {
        let hy = inbound(json!({"type": "hysteria2", "tag": "hy", "up_mbps": 100, "down_mbps": 20}));
        let out = build_out_json(&hy, None, "h");
        assert_eq!(out["up_mbps"], 20);
        assert_eq!(out["down_mbps"], 100);
    }

    #[test]
    fn test_userless_inbound_has_no_snapshot() {
        let tun = inbound(json!({"type": "tun", "tag": "tun-in"}));
        assert!(build_out_json(&tun, None, "h").is_empty());
    }
}
