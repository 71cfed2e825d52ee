//! Inbound saves.
//!
//! # Data Flow
//! ```text
//! new/edit: tag check → resolve tls → out_json → write row
//!           → link init users → resync linked clients
//!           → core: remove old tag (soft), add with users (hard)
//! del:      core remove (not-found is soft) → unlink clients
//!           → strip their local descriptors → delete row
//! ```
//!
//! Core calls happen inside the transaction, so a rejected listener rolls
//! the whole save back.

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, warn};

use crate::assembler;
use crate::engine::save::Mutation;
use crate::engine::{resync_clients, Action, Engine, EngineError, EngineResult, Handle};
use crate::links::{self, build_out_json};
use crate::model::Inbound;
use crate::store::{self, clients, inbounds, tls};
use crate::validation::{check_tag_unique, TaggedClass, ValidationError};

impl Engine {
    pub(super) fn save_inbounds(
        &self,
        tx: &Connection,
        action: Action,
        payload: Value,
        init_users: &[i64],
    ) -> EngineResult<Mutation> {
        match action {
            Action::New => self.write_inbound(tx, Inbound::from_payload(payload)?, None, init_users),
            Action::Edit => {
                let inbound = Inbound::from_payload(payload)?;
                let previous = inbounds::get(tx, inbound.id)?.ok_or_else(|| ValidationError::NotFound {
                    class: "inbound",
                    key: inbound.id.to_string(),
                })?;
                self.write_inbound(tx, inbound, Some(previous), &[])
            }
            Action::Del => self.delete_inbound(tx, &payload),
            Action::AddBulk => Err(ValidationError::UnsupportedAction {
                class: "inbounds",
                action: action.as_str(),
            }
            .into()),
        }
    }

    fn write_inbound(
        &self,
        tx: &Connection,
        mut inbound: Inbound,
        previous: Option<Inbound>,
        init_users: &[i64],
    ) -> EngineResult<Mutation> {
        let self_id = previous.as_ref().map(|p| p.id);
        check_tag_unique(tx, TaggedClass::Inbound, &inbound.tag, self_id)?;

        let profile = match inbound.tls_id {
            Some(id) => Some(tls::get(tx, id)?.ok_or_else(|| ValidationError::NotFound {
                class: "tls profile",
                key: id.to_string(),
            })?),
            None => None,
        };
        inbound.out_json = build_out_json(&inbound, profile.as_ref(), &self.hostname);

        match self_id {
            Some(id) => {
                inbound.id = id;
                inbounds::update(tx, &inbound)?;
            }
            None => inbound.id = inbounds::insert(tx, &inbound)?,
        }

        for &client_id in init_users {
            let mut client = clients::get(tx, client_id)?.ok_or_else(|| ValidationError::NotFound {
                class: "client",
                key: client_id.to_string(),
            })?;
            if !client.inbounds.contains(&inbound.id) {
                client.inbounds.push(inbound.id);
                clients::set_links(tx, client.id, &client.inbounds, &client.links)?;
            }
        }
        let resynced = resync_clients(tx, inbound.id)?;
        debug!(tag = %inbound.tag, clients = resynced, "Linked clients resynced");

        if self.core.is_running() {
            if let Some(previous) = &previous {
                if let Err(e) = self.core.remove_inbound(&previous.tag) {
                    if !e.is_not_found() {
                        warn!(tag = %previous.tag, error = %e, "Removing previous inbound failed");
                    }
                }
            }
            let config = assembler::inbound_document(tx, &inbound)?;
            self.core
                .add_inbound(&config)
                .map_err(|e| EngineError::core("add inbound", &inbound.tag, e))?;
        }

        Ok(Mutation::touched(inbound.id))
    }

    fn delete_inbound(&self, tx: &Connection, payload: &Value) -> EngineResult<Mutation> {
        let handle = Handle::from_payload("inbound", payload)?;
        let inbound = match &handle {
            Handle::Id(id) => inbounds::get(tx, *id)?,
            Handle::Name(tag) => inbounds::get_by_tag(tx, tag)?,
        }
        .ok_or_else(|| handle.not_found("inbound"))?;

        if self.core.is_running() {
            match self.core.remove_inbound(&inbound.tag) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(tag = %inbound.tag, "Inbound was not live");
                }
                Err(e) => return Err(EngineError::core("remove inbound", &inbound.tag, e)),
            }
        }

        for mut client in clients::list_linked(tx, inbound.id)? {
            client.inbounds.retain(|&id| id != inbound.id);
            let kept = links::strip_inbound(&client.links, &inbound.tag);
            clients::set_links(tx, client.id, &client.inbounds, &kept)?;
        }
        store::delete_by_id(tx, "inbounds", inbound.id)?;

        Ok(Mutation::touched(inbound.id))
    }
}
