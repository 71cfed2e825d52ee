//! TLS profile saves.
//!
//! Editing a profile changes the `tls` block of every inbound using it and
//! the client-side snapshot derived from it, so those inbounds get a fresh
//! `out_json`, their clients get fresh descriptors, and the core restarts
//! them after commit.

use rusqlite::Connection;
use serde_json::Value;

use crate::engine::save::Mutation;
use crate::engine::{resync_clients, Action, Engine, EngineResult, Handle};
use crate::links::build_out_json;
use crate::model::TlsProfile;
use crate::store::{self, inbounds, tls};
use crate::validation::{check_name_unique, NamedClass, ValidationError};

impl Engine {
    pub(super) fn save_tls(&self, tx: &Connection, action: Action, payload: Value) -> EngineResult<Mutation> {
        match action {
            Action::New => {
                let mut profile = TlsProfile::from_payload(payload)?;
                check_name_unique(tx, NamedClass::Tls, &profile.name, None)?;
                profile.id = tls::insert(tx, &profile)?;
                Ok(Mutation::touched(profile.id))
            }
            Action::Edit => {
                let profile = TlsProfile::from_payload(payload)?;
                if tls::get(tx, profile.id)?.is_none() {
                    return Err(ValidationError::NotFound {
                        class: "tls profile",
                        key: profile.id.to_string(),
                    }
                    .into());
                }
                check_name_unique(tx, NamedClass::Tls, &profile.name, Some(profile.id))?;
                tls::update(tx, &profile)?;

                let mut mutation = Mutation::touched(profile.id);
                for inbound in inbounds::list_by_tls(tx, profile.id)? {
                    let out_json = build_out_json(&inbound, Some(&profile), &self.hostname);
                    inbounds::set_out_json(tx, inbound.id, &out_json)?;
                    resync_clients(tx, inbound.id)?;
                    mutation.restart_inbounds.push(inbound.id);
                }
                Ok(mutation)
            }
            Action::Del => {
                let handle = Handle::from_payload("tls profile", &payload)?;
                let profile = match &handle {
                    Handle::Id(id) => tls::get(tx, *id)?,
                    Handle::Name(name) => tls::list(tx)?.into_iter().find(|p| &p.name == name),
                }
                .ok_or_else(|| handle.not_found("tls profile"))?;

                let users = inbounds::list_by_tls(tx, profile.id)?;
                if !users.is_empty() {
                    return Err(ValidationError::TlsInUse {
                        id: profile.id,
                        inbounds: users.into_iter().map(|i| i.tag).collect(),
                    }
                    .into());
                }
                store::delete_by_id(tx, "tls", profile.id)?;
                Ok(Mutation::touched(profile.id))
            }
            Action::AddBulk => Err(ValidationError::UnsupportedAction {
                class: "tls",
                action: action.as_str(),
            }
            .into()),
        }
    }
}
