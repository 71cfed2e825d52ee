//! Share-link URIs.
//!
//! Every builder reads the dial target from the inbound's out-json snapshot
//! and the secret from the client's credential for that inbound.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::{json, Value};
use url::Url;

use crate::model::{ExtensionBag, Inbound};

fn text<'a>(bag: &'a ExtensionBag, key: &str) -> Option<&'a str> {
    bag.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Dial target and TLS hints taken from an out-json snapshot.
struct Target<'a> {
    out: &'a ExtensionBag,
    server: &'a str,
    port: u64,
}

impl<'a> Target<'a> {
    fn from_out_json(out: &'a ExtensionBag) -> Option<Self> {
        Some(Self {
            out,
            server: text(out, "server")?,
            port: out.get("server_port").and_then(Value::as_u64)?,
        })
    }

    fn tls(&self) -> Option<&'a Value> {
        self.out.get("tls").filter(|t| t["enabled"] == true)
    }

    fn sni(&self) -> Option<&'a str> {
        self.tls()?.get("server_name")?.as_str()
    }

    fn insecure(&self) -> bool {
        self.tls().is_some_and(|t| t["insecure"] == true)
    }

    fn alpn(&self) -> Option<String> {
        let alpn = self.tls()?.get("alpn")?.as_array()?;
        let joined: Vec<&str> = alpn.iter().filter_map(Value::as_str).collect();
        (!joined.is_empty()).then(|| joined.join(","))
    }

    fn transport(&self) -> Option<&'a Value> {
        self.out.get("transport")
    }

    fn host(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            format!("[{}]", self.server)
        } else {
            self.server.to_string()
        }
    }

    fn url(&self, scheme: &str) -> Option<Url> {
        Url::parse(&format!("{scheme}://{}:{}", self.host(), self.port)).ok()
    }
}

/// Builds the share link of `inbound` for a client credential.
///
/// `None` when the inbound has no snapshot, the protocol has no link form,
/// or the credential lacks the secret the link needs.
pub fn link(inbound: &Inbound, credential: &ExtensionBag) -> Option<String> {
    let target = Target::from_out_json(&inbound.out_json)?;
    let tag = inbound.tag.as_str();
    let uri = match inbound.kind.as_str() {
        "vless" => vless(&target, credential, tag),
        "vmess" => return vmess(&target, credential, tag),
        "trojan" => trojan(&target, credential, tag),
        "shadowsocks" => return shadowsocks(&target, credential, tag),
        "hysteria" => hysteria(&target, credential, tag),
        "hysteria2" => hysteria2(&target, credential, tag),
        "tuic" => tuic(&target, credential, tag),
        "naive" => userpass(&target, credential, tag, "naive+https"),
        "socks" | "mixed" => userpass(&target, credential, tag, "socks5"),
        "http" => {
            let scheme = if target.tls().is_some() { "https" } else { "http" };
            userpass(&target, credential, tag, scheme)
        }
        _ => None,
    }?;
    Some(uri.to_string())
}

fn finish(mut url: Url, params: Vec<(&str, String)>, tag: &str) -> Url {
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    url.set_fragment(Some(tag));
    url
}

/// `type`, `path`, `host` and `serviceName` query parameters of a transport.
fn transport_params<'a>(target: &Target<'a>, params: &mut Vec<(&'static str, String)>) {
    let Some(transport) = target.transport() else {
        params.push(("type", "tcp".into()));
        return;
    };
    let kind = transport["type"].as_str().unwrap_or("tcp");
    params.push(("type", kind.to_string()));
    if let Some(path) = transport["path"].as_str() {
        params.push(("path", path.to_string()));
    }
    let host = match &transport["host"] {
        Value::String(h) => Some(h.clone()),
        Value::Array(hosts) => hosts.first().and_then(Value::as_str).map(str::to_string),
        _ => transport["headers"]["Host"].as_str().map(str::to_string),
    };
    if let Some(host) = host {
        params.push(("host", host));
    }
    if let Some(service) = transport["service_name"].as_str() {
        params.push(("serviceName", service.to_string()));
    }
}

fn security_params<'a>(target: &Target<'a>, params: &mut Vec<(&'static str, String)>) {
    let Some(tls) = target.tls() else {
        params.push(("security", "none".into()));
        return;
    };
    let reality = tls.get("reality").filter(|r| r["enabled"] == true);
    params.push((
        "security",
        if reality.is_some() { "reality" } else { "tls" }.into(),
    ));
    if let Some(sni) = target.sni() {
        params.push(("sni", sni.to_string()));
    }
    if let Some(fp) = tls["utls"]["fingerprint"].as_str() {
        params.push(("fp", fp.to_string()));
    }
    if let Some(alpn) = target.alpn() {
        params.push(("alpn", alpn));
    }
    if let Some(reality) = reality {
        if let Some(pbk) = reality["public_key"].as_str() {
            params.push(("pbk", pbk.to_string()));
        }
        if let Some(sid) = reality["short_id"].as_str() {
            params.push(("sid", sid.to_string()));
        }
    }
    if target.insecure() {
        params.push(("allowInsecure", "1".into()));
    }
}

fn vless(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<Url> {
    let mut url = target.url("vless")?;
    url.set_username(text(credential, "uuid")?).ok()?;

    let mut params = Vec::new();
    transport_params(target, &mut params);
    security_params(target, &mut params);
    if target.tls().is_some() {
        if let Some(flow) = text(credential, "flow") {
            params.push(("flow", flow.to_string()));
        }
    }
    Some(finish(url, params, tag))
}

fn vmess(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<String> {
    let uuid = text(credential, "uuid")?;
    let transport = target.transport();
    let net = transport
        .and_then(|t| t["type"].as_str())
        .unwrap_or("tcp");
    let security = if target.tls().is_some() { "tls" } else { "" };
    let doc = json!({
        "v": "2",
        "ps": tag,
        "add": target.server,
        "port": target.port,
        "id": uuid,
        "aid": credential.get("alterId").cloned().unwrap_or(json!(0)),
        "scy": "auto",
        "net": net,
        "type": "none",
        "host": transport.and_then(|t| t["host"].as_str()).unwrap_or_default(),
        "path": transport.and_then(|t| t["path"].as_str()).unwrap_or_default(),
        "tls": security,
        "sni": target.sni().unwrap_or_default(),
        "alpn": target.alpn().unwrap_or_default(),
    });
    Some(format!("vmess://{}", STANDARD.encode(doc.to_string())))
}

fn trojan(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<Url> {
    let mut url = target.url("trojan")?;
    url.set_username(text(credential, "password")?).ok()?;

    let mut params = Vec::new();
    transport_params(target, &mut params);
    security_params(target, &mut params);
    Some(finish(url, params, tag))
}

/// SIP002: `ss://base64url(method:password)@host:port#tag`.
fn shadowsocks(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<String> {
    let method = text(target.out, "method")?;
    let user_key = text(credential, "password")?;
    let password = match text(target.out, "password") {
        Some(server_key) if method.starts_with("2022") => format!("{server_key}:{user_key}"),
        _ => user_key.to_string(),
    };
    let userinfo = URL_SAFE_NO_PAD.encode(format!("{method}:{password}"));
    let mut url = target.url("ss")?;
    url.set_username(&userinfo).ok()?;
    Some(finish(url, Vec::new(), tag).to_string())
}

fn hysteria(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<Url> {
    let url = target.url("hysteria")?;
    let mut params = vec![("auth", text(credential, "auth_str")?.to_string())];
    for (key, field) in [("upmbps", "up_mbps"), ("downmbps", "down_mbps")] {
        if let Some(mbps) = target.out.get(field).and_then(Value::as_u64) {
            params.push((key, mbps.to_string()));
        }
    }
    if let Some(obfs) = text(target.out, "obfs") {
        params.push(("obfsParam", obfs.to_string()));
    }
    if let Some(sni) = target.sni() {
        params.push(("peer", sni.to_string()));
    }
    if let Some(alpn) = target.alpn() {
        params.push(("alpn", alpn));
    }
    if target.insecure() {
        params.push(("insecure", "1".into()));
    }
    Some(finish(url, params, tag))
}

fn hysteria2(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<Url> {
    let mut url = target.url("hysteria2")?;
    url.set_username(text(credential, "password")?).ok()?;

    let mut params = Vec::new();
    if let Some(sni) = target.sni() {
        params.push(("sni", sni.to_string()));
    }
    if let Some(obfs) = target.out.get("obfs") {
        if let Some(kind) = obfs["type"].as_str() {
            params.push(("obfs", kind.to_string()));
        }
        if let Some(password) = obfs["password"].as_str() {
            params.push(("obfs-password", password.to_string()));
        }
    }
    if target.insecure() {
        params.push(("insecure", "1".into()));
    }
    Some(finish(url, params, tag))
}

fn tuic(target: &Target<'_>, credential: &ExtensionBag, tag: &str) -> Option<Url> {
    let mut url = target.url("tuic")?;
    url.set_username(text(credential, "uuid")?).ok()?;
    url.set_password(Some(text(credential, "password")?)).ok()?;

    let mut params = Vec::new();
    if let Some(cc) = text(target.out, "congestion_control") {
        params.push(("congestion_control", cc.to_string()));
    }
    if let Some(sni) = target.sni() {
        params.push(("sni", sni.to_string()));
    }
    if let Some(alpn) = target.alpn() {
        params.push(("alpn", alpn));
    }
    if target.insecure() {
        params.push(("allow_insecure", "1".into()));
    }
    Some(finish(url, params, tag))
}

fn userpass(target: &Target<'_>, credential: &ExtensionBag, tag: &str, scheme: &str) -> Option<Url> {
    let mut url = target.url(scheme)?;
    url.set_username(text(credential, "username")?).ok()?;
    if let Some(password) = text(credential, "password") {
        url.set_password(Some(password)).ok()?;
    }
    Some(finish(url, Vec::new(), tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::build_out_json;
    use crate::model::TlsProfile;

    fn inbound(payload: Value, tls: Option<&TlsProfile>) -> Inbound {
        let mut inbound = Inbound::from_payload(payload).unwrap();
        inbound.out_json = build_out_json(&inbound, tls, "proxy.example.com");
        inbound
    }

    fn cred(value: Value) -> ExtensionBag {
        value.as_object().cloned().unwrap()
    }

    fn tls() -> TlsProfile {
        TlsProfile {
            id: 1,
            name: "main".into(),
            server: json!({"enabled": true, "server_name": "example.com"}),
            client: json!({}),
        }
    }

    #[test]
    fn test_vless_link() {
        let profile = tls();
        let ib = inbound(
            json!({"type": "vless", "tag": "in1", "listen_port": 443}),
            Some(&profile),
        );
        let uri = link(&ib, &cred(json!({"uuid": "u-1", "flow": "xtls-rprx-vision"}))).unwrap();
        assert!(uri.starts_with("vless://u-1@proxy.example.com:443?"), "{uri}");
        assert!(uri.contains("security=tls"));
        assert!(uri.contains("sni=example.com"));
        assert!(uri.contains("flow=xtls-rprx-vision"));
        assert!(uri.ends_with("#in1"));
    }

    #[test]
    fn test_vmess_link_is_base64_json() {
        let ib = inbound(json!({"type": "vmess", "tag": "vm", "listen_port": 8080}), None);
        let uri = link(&ib, &cred(json!({"uuid": "u-2"}))).unwrap();
        let payload = uri.strip_prefix("vmess://").unwrap();
        let doc: Value = serde_json::from_slice(&STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!(doc["add"], "proxy.example.com");
        assert_eq!(doc["port"], 8080);
        assert_eq!(doc["id"], "u-2");
        assert_eq!(doc["ps"], "vm");
    }

    #[test]
    fn test_shadowsocks_2022_prefixes_server_key() {
        let ib = inbound(
            json!({
                "type": "shadowsocks", "tag": "ss", "listen_port": 8388,
                "method": "2022-blake3-aes-128-gcm", "password": "SERVER",
            }),
            None,
        );
        let uri = link(&ib, &cred(json!({"password": "USER"}))).unwrap();
        let userinfo = uri
            .strip_prefix("ss://")
            .and_then(|rest| rest.split('@').next())
            .unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(userinfo).unwrap()).unwrap();
        assert_eq!(decoded, "2022-blake3-aes-128-gcm:SERVER:USER");
        assert!(uri.ends_with("#ss"));
    }

    #[test]
    fn test_socks_and_missing_secret() {
        let ib = inbound(json!({"type": "mixed", "tag": "mx", "listen_port": 1080}), None);
        let uri = link(&ib, &cred(json!({"username": "bob", "password": "pw"}))).unwrap();
        assert_eq!(uri, "socks5://bob:pw@proxy.example.com:1080#mx");

        assert!(link(&ib, &cred(json!({"password": "pw"}))).is_none());
    }

    #[test]
    fn test_shadowtls_has_no_link() {
        let ib = inbound(json!({"type": "shadowtls", "tag": "st", "listen_port": 443}), None);
        assert!(link(&ib, &cred(json!({"name": "a", "password": "p"}))).is_none());
    }
}
