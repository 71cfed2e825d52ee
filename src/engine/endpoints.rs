//! Endpoint saves, including provisioned tunnels.
//!
//! # Data Flow
//! ```text
//! new:  tag check → (warp) register device, apply registration,
//!       push requested license → peer shape → range disjointness
//!       → core add (hard) → insert
//! edit: tag check → keep stored ext, take only license_key from payload
//!       → (warp) register if never provisioned, else push changed license
//!       → peer shape → range disjointness → core replace (hard) → update
//! del:  core remove (not-found is soft) → delete
//! ```
//!
//! # Design Decisions
//! - `ext` holds provisioning secrets and is never sent to the core
//! - The only user-editable part of `ext` is `license_key`

use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::engine::save::Mutation;
use crate::engine::{Action, Engine, EngineError, EngineResult, Handle};
use crate::model::Endpoint;
use crate::provision::ext_str;
use crate::store::{self, endpoints};
use crate::validation::{
    check_disjoint_ranges, check_peer_shape, check_tag_unique, TaggedClass, ValidationError,
};

impl Engine {
    pub(super) fn save_endpoints(
        &self,
        tx: &Connection,
        action: Action,
        payload: Value,
    ) -> EngineResult<Mutation> {
        match action {
            Action::New => {
                let mut endpoint = Endpoint::from_payload(payload)?;
                endpoint.id = 0;
                check_tag_unique(tx, TaggedClass::Endpoint, &endpoint.tag, None)?;

                let requested = endpoint.license_key().to_string();
                endpoint.ext.clear();
                if endpoint.is_provisioned() {
                    self.provision(&mut endpoint, &requested)?;
                }
                self.check_endpoint(tx, &endpoint)?;

                if self.core.is_running() {
                    self.core
                        .add_endpoint(&endpoint.to_config())
                        .map_err(|e| EngineError::core("add endpoint", &endpoint.tag, e))?;
                }
                endpoint.id = endpoints::insert(tx, &endpoint)?;
                Ok(Mutation::touched(endpoint.id))
            }
            Action::Edit => {
                let mut endpoint = Endpoint::from_payload(payload)?;
                let previous = endpoints::get(tx, endpoint.id)?.ok_or_else(|| ValidationError::NotFound {
                    class: "endpoint",
                    key: endpoint.id.to_string(),
                })?;
                check_tag_unique(tx, TaggedClass::Endpoint, &endpoint.tag, Some(previous.id))?;

                let requested = endpoint.license_key().to_string();
                endpoint.ext = previous.ext.clone();
                if endpoint.is_provisioned() {
                    if ext_str(&endpoint, "device_id").is_empty() {
                        self.provision(&mut endpoint, &requested)?;
                    } else if requested != endpoint.license_key() {
                        self.provisioner.update_license(
                            ext_str(&endpoint, "device_id"),
                            ext_str(&endpoint, "access_token"),
                            &requested,
                        )?;
                        endpoint.ext.insert("license_key".into(), json!(requested));
                        info!(tag = %endpoint.tag, "Tunnel license changed");
                    }
                }
                self.check_endpoint(tx, &endpoint)?;

                if self.core.is_running() {
                    // add_endpoint replaces in place unless the identity moved
                    if previous.tag != endpoint.tag || previous.kind != endpoint.kind {
                        match self.core.remove_endpoint(&previous.tag) {
                            Ok(()) => {}
                            Err(e) if e.is_not_found() => {}
                            Err(e) => return Err(EngineError::core("remove endpoint", &previous.tag, e)),
                        }
                    }
                    self.core
                        .add_endpoint(&endpoint.to_config())
                        .map_err(|e| EngineError::core("add endpoint", &endpoint.tag, e))?;
                }
                endpoints::update(tx, &endpoint)?;
                Ok(Mutation::touched(endpoint.id))
            }
            Action::Del => {
                let handle = Handle::from_payload("endpoint", &payload)?;
                let endpoint = match &handle {
                    Handle::Id(id) => endpoints::get(tx, *id)?,
                    Handle::Name(tag) => endpoints::get_by_tag(tx, tag)?,
                }
                .ok_or_else(|| handle.not_found("endpoint"))?;

                if self.core.is_running() {
                    match self.core.remove_endpoint(&endpoint.tag) {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {
                            debug!(tag = %endpoint.tag, "Endpoint was not live");
                        }
                        Err(e) => return Err(EngineError::core("remove endpoint", &endpoint.tag, e)),
                    }
                }
                store::delete_by_id(tx, "endpoints", endpoint.id)?;
                Ok(Mutation::touched(endpoint.id))
            }
            Action::AddBulk => Err(ValidationError::UnsupportedAction {
                class: "endpoints",
                action: action.as_str(),
            }
            .into()),
        }
    }

    /// Registers a device for `endpoint` and, when the caller asked for a
    /// different license than the one issued, pushes it.
    fn provision(&self, endpoint: &mut Endpoint, requested_license: &str) -> EngineResult<()> {
        let registration = self.provisioner.register()?;
        registration.apply(endpoint);
        info!(tag = %endpoint.tag, device_id = %registration.device_id, "Tunnel provisioned");

        if !requested_license.is_empty() && requested_license != registration.license_key {
            self.provisioner.update_license(
                &registration.device_id,
                &registration.access_token,
                requested_license,
            )?;
            endpoint.ext.insert("license_key".into(), json!(requested_license));
        }
        Ok(())
    }

    fn check_endpoint(&self, tx: &Connection, endpoint: &Endpoint) -> EngineResult<()> {
        check_peer_shape(endpoint)?;
        check_disjoint_ranges(tx, endpoint)?;
        Ok(())
    }
}
