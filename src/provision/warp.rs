//! WARP-style device registration over HTTPS.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use rand::rngs::OsRng;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::config::schema::ProvisioningConfig;
use crate::provision::{PeerProvisioner, PeerRegistration, ProvisionError, RemotePeer};

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: String,
    token: String,
    #[serde(default)]
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    license: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    config: DeviceConfig,
}

#[derive(Debug, Deserialize)]
struct DeviceConfig {
    client_id: String,
    interface: Interface,
    peers: Vec<Peer>,
}

#[derive(Debug, Deserialize)]
struct Interface {
    addresses: Addresses,
}

#[derive(Debug, Deserialize)]
struct Addresses {
    v4: String,
    v6: String,
}

#[derive(Debug, Deserialize)]
struct Peer {
    public_key: String,
    endpoint: PeerEndpoint,
}

#[derive(Debug, Deserialize)]
struct PeerEndpoint {
    host: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    message: String,
}

/// HTTPS client of the device-registration API.
pub struct WarpClient {
    config: ProvisioningConfig,
}

impl WarpClient {
    pub fn new(config: ProvisioningConfig) -> Self {
        Self { config }
    }

    /// Built per call: a blocking client must not be created or dropped on
    /// an async worker thread, and engine calls run on blocking threads.
    fn http(&self) -> Result<Client, ProvisionError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn device(&self, http: &Client, device_id: &str, token: &str) -> Result<DeviceConfig, ProvisionError> {
        let response: DeviceResponse = http
            .get(self.url(&format!("reg/{device_id}")))
            .bearer_auth(token)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.config)
    }
}

/// Client ids decode to the three routing bytes the tunnel must carry.
fn reserved_bytes(client_id: &str) -> Vec<u8> {
    STANDARD.decode(client_id).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Undecodable client id, sending no reserved bytes");
        Vec::new()
    })
}

fn split_host_port(host: &str) -> Result<(String, u16), ProvisionError> {
    let malformed = || ProvisionError::MalformedResponse(format!("bad peer endpoint '{host}'"));
    let (addr, port) = host.rsplit_once(':').ok_or_else(malformed)?;
    let port = port.parse().map_err(|_| malformed())?;
    let addr = addr.trim_start_matches('[').trim_end_matches(']');
    Ok((addr.to_string(), port))
}

impl PeerProvisioner for WarpClient {
    fn register(&self) -> Result<PeerRegistration, ProvisionError> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let http = self.http()?;

        let body = json!({
            "key": STANDARD.encode(public.as_bytes()),
            "tos": Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "type": "PC",
            "model": self.config.device_model,
            "name": self.config.device_name,
        });
        let registered: RegisterResponse = http
            .post(self.url("reg"))
            .header("CF-Client-Version", &self.config.client_version)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        let device = self.device(&http, &registered.id, &registered.token)?;
        let peer = device
            .peers
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::MalformedResponse("no peers in device config".into()))?;
        let (address, port) = split_host_port(&peer.endpoint.host)?;

        tracing::info!(device_id = %registered.id, "Tunnel device registered");
        Ok(PeerRegistration {
            device_id: registered.id,
            access_token: registered.token,
            license_key: registered
                .account
                .and_then(|a| a.license)
                .unwrap_or_default(),
            private_key: STANDARD.encode(secret.to_bytes()),
            ipv4: device.interface.addresses.v4,
            ipv6: device.interface.addresses.v6,
            peer: RemotePeer {
                address,
                port,
                public_key: peer.public_key,
                reserved: reserved_bytes(&device.client_id),
            },
        })
    }

    fn update_license(
        &self,
        device_id: &str,
        access_token: &str,
        license: &str,
    ) -> Result<(), ProvisionError> {
        let status: ApiStatus = self
            .http()?
            .put(self.url(&format!("reg/{device_id}/account")))
            .bearer_auth(access_token)
            .json(&json!({ "license": license }))
            .send()?
            .json()?;

        if status.success == Some(false) {
            let (code, message) = match status.errors.into_iter().next() {
                Some(e) => (
                    match e.code {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    },
                    e.message,
                ),
                None => ("unknown_error".into(), "license update failed".into()),
            };
            return Err(ProvisionError::Api { code, message });
        }
        tracing::info!(device_id, "Tunnel license updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_endpoint_split() {
        assert_eq!(
            split_host_port("engage.cloudflareclient.com:2408").unwrap(),
            ("engage.cloudflareclient.com".to_string(), 2408)
        );
        assert_eq!(
            split_host_port("[2606:4700:d0::a29f:c001]:500").unwrap(),
            ("2606:4700:d0::a29f:c001".to_string(), 500)
        );
        assert!(split_host_port("no-port").is_err());
    }

    #[test]
    fn test_reserved_bytes_from_client_id() {
        assert_eq!(reserved_bytes("AQID"), vec![1, 2, 3]);
        assert!(reserved_bytes("%%%").is_empty());
    }
}
