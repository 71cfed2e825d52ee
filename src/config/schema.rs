//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the control daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Entity store location.
    pub store: StoreConfig,

    /// Save engine settings.
    pub engine: EngineConfig,

    /// Periodic client depletion sweep.
    pub sweep: SweepConfig,

    /// Change-feed follower that resyncs the core after external writes.
    pub follower: FollowerConfig,

    /// Live core settings.
    pub core: CoreConfig,

    /// Peer provisioning client.
    pub provisioning: ProvisioningConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Entity store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: String,

    /// How long a writer waits for the database lock (milliseconds).
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/control.db".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Public hostname clients dial when an inbound listens on all interfaces.
    pub hostname: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
        }
    }
}

/// Depletion sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,

    /// Interval between sweeps (seconds).
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// Change follower configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FollowerConfig {
    pub enabled: bool,

    /// Poll interval (seconds).
    pub interval_secs: u64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
        }
    }
}

/// Live core configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Where the running document is materialized after every change.
    pub snapshot_path: Option<String>,
}

/// Peer provisioning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Enable registration of provisioned tunnel endpoints.
    pub enabled: bool,

    /// Base URL of the registration API.
    pub api_url: String,

    /// Client version header sent on registration.
    pub client_version: String,

    /// Device model reported on registration.
    pub device_model: String,

    /// Device name reported on registration.
    pub device_name: String,

    /// Request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.cloudflareclient.com/v0a2158".to_string(),
            client_version: "a-7.21-0721".to_string(),
            device_model: "proxy-control".to_string(),
            device_name: "proxy-control".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
