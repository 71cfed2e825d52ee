//! Peer-credential provisioning.
//!
//! # Responsibilities
//! - Register new tunnel devices with the provisioning service
//! - Push license changes of already registered devices
//! - Fold a registration into an endpoint (`ext` secrets + tunnel options)
//!
//! # Design Decisions
//! - The provisioner is a trait object on the engine, so tests and the CLI
//!   can swap the HTTP client out
//! - Calls are blocking; they run inside the endpoint save transaction and
//!   their failures abort it

mod warp;

pub use warp::WarpClient;

use serde_json::{json, Value};
use thiserror::Error;

use crate::model::Endpoint;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("peer provisioning is disabled")]
    Disabled,

    #[error("provisioning request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provisioning service error {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed provisioning response: {0}")]
    MalformedResponse(String),
}

/// Remote side of a provisioned tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePeer {
    pub address: String,
    pub port: u16,
    pub public_key: String,
    /// Routing bytes derived from the device's client id.
    pub reserved: Vec<u8>,
}

/// Material returned by a successful device registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRegistration {
    pub device_id: String,
    pub access_token: String,
    pub license_key: String,
    /// Base64 private key of the local tunnel interface.
    pub private_key: String,
    pub ipv4: String,
    pub ipv6: String,
    pub peer: RemotePeer,
}

impl PeerRegistration {
    /// Writes the secrets into `ext` and the tunnel settings into the
    /// endpoint options. Other options are left alone.
    pub fn apply(&self, endpoint: &mut Endpoint) {
        endpoint.ext.insert("access_token".into(), json!(self.access_token));
        endpoint.ext.insert("device_id".into(), json!(self.device_id));
        endpoint.ext.insert("license_key".into(), json!(self.license_key));

        let options = &mut endpoint.options;
        options.insert("private_key".into(), json!(self.private_key));
        options.insert(
            "address".into(),
            json!([format!("{}/32", self.ipv4), format!("{}/128", self.ipv6)]),
        );
        options.insert("listen_port".into(), json!(0));
        options.insert(
            "peers".into(),
            json!([{
                "address": self.peer.address,
                "port": self.peer.port,
                "public_key": self.peer.public_key,
                "allowed_ips": ["0.0.0.0/0", "::/0"],
                "reserved": self.peer.reserved,
            }]),
        );
    }
}

/// Client of the peer-provisioning service.
pub trait PeerProvisioner: Send + Sync {
    /// Registers a fresh device.
    fn register(&self) -> Result<PeerRegistration, ProvisionError>;

    /// Associates `license` with an already registered device.
    fn update_license(
        &self,
        device_id: &str,
        access_token: &str,
        license: &str,
    ) -> Result<(), ProvisionError>;
}

/// Provisioner used when provisioning is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvisioner;

impl PeerProvisioner for DisabledProvisioner {
    fn register(&self) -> Result<PeerRegistration, ProvisionError> {
        Err(ProvisionError::Disabled)
    }

    fn update_license(&self, _: &str, _: &str, _: &str) -> Result<(), ProvisionError> {
        Err(ProvisionError::Disabled)
    }
}

pub(crate) fn ext_str<'a>(endpoint: &'a Endpoint, key: &str) -> &'a str {
    endpoint.ext.get(key).and_then(Value::as_str).unwrap_or_default()
}
