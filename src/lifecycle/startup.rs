//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the entity store named by the config
//! - Select the peer provisioner
//! - Assemble the engine around a caller-supplied core adapter
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The core adapter is a parameter: the daemon passes a live core, the
//!   CLI a detached one

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ControlConfig;
use crate::core::CoreAdapter;
use crate::engine::Engine;
use crate::provision::{DisabledProvisioner, PeerProvisioner, WarpClient};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open store at {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// Builds the engine from a loaded config.
pub fn build_engine(
    config: &ControlConfig,
    core: Arc<dyn CoreAdapter>,
) -> Result<Engine, StartupError> {
    let store = Store::open(
        Path::new(&config.store.path),
        Duration::from_millis(config.store.busy_timeout_ms),
    )
    .map_err(|source| StartupError::Store {
        path: config.store.path.clone(),
        source,
    })?;
    tracing::info!(path = %config.store.path, "Store opened");

    let provisioner: Arc<dyn PeerProvisioner> = if config.provisioning.enabled {
        tracing::info!(api_url = %config.provisioning.api_url, "Peer provisioning enabled");
        Arc::new(WarpClient::new(config.provisioning.clone()))
    } else {
        Arc::new(DisabledProvisioner)
    };

    Ok(Engine::new(
        Arc::new(store),
        core,
        provisioner,
        config.engine.hostname.clone(),
    ))
}
