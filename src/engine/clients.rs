//! Client saves.
//!
//! A client's descriptors are derived from the inbounds it links to, so
//! every write regenerates them before the row is stored. The inbounds the
//! client was removed from and the ones it was added to both need their
//! user lists refreshed.

use std::collections::HashSet;

use rusqlite::Connection;
use serde_json::Value;

use crate::engine::save::Mutation;
use crate::engine::{linked_inbounds, Action, Engine, EngineResult, Handle};
use crate::links;
use crate::model::Client;
use crate::store::{self, clients, inbounds};
use crate::validation::{check_name_unique, NamedClass, ValidationError};

/// Keeps the first occurrence of each id.
fn dedup_ordered(ids: &mut Vec<i64>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
}

impl Engine {
    pub(super) fn save_clients(
        &self,
        tx: &Connection,
        action: Action,
        payload: Value,
    ) -> EngineResult<Mutation> {
        match action {
            Action::New => self.write_client(tx, Client::from_payload(payload)?, false),
            Action::Edit => self.write_client(tx, Client::from_payload(payload)?, true),
            Action::AddBulk => {
                let Value::Array(items) = payload else {
                    return Err(ValidationError::Malformed {
                        class: "client",
                        reason: "addbulk expects an array of clients".into(),
                    }
                    .into());
                };
                let mut mutation = Mutation::default();
                for item in items {
                    mutation.merge(self.write_client(tx, Client::from_payload(item)?, false)?);
                }
                Ok(mutation)
            }
            Action::Del => {
                let handle = Handle::from_payload("client", &payload)?;
                let client = match &handle {
                    Handle::Id(id) => clients::get(tx, *id)?,
                    Handle::Name(name) => clients::get_by_name(tx, name)?,
                }
                .ok_or_else(|| handle.not_found("client"))?;

                store::delete_by_id(tx, "clients", client.id)?;
                tracing::debug!(client = %client.name, "Client deleted");
                Ok(Mutation {
                    objects: vec![client.id],
                    restart_inbounds: client.inbounds,
                    restart_core: false,
                })
            }
        }
    }

    fn write_client(&self, tx: &Connection, mut client: Client, edit: bool) -> EngineResult<Mutation> {
        let previous = if edit {
            Some(clients::get(tx, client.id)?.ok_or_else(|| ValidationError::NotFound {
                class: "client",
                key: client.id.to_string(),
            })?)
        } else {
            client.id = 0;
            None
        };
        check_name_unique(tx, NamedClass::Client, &client.name, previous.as_ref().map(|c| c.id))?;

        dedup_ordered(&mut client.inbounds);
        for &id in &client.inbounds {
            if !inbounds::exists(tx, id)? {
                return Err(ValidationError::UnknownInbound(id).into());
            }
        }

        let linked = linked_inbounds(tx, &client)?;
        client.links = links::regenerate(&client, &linked);

        let mut restart = client.inbounds.clone();
        match previous {
            Some(previous) => {
                clients::update(tx, &client)?;
                restart.extend(previous.inbounds);
                dedup_ordered(&mut restart);
            }
            None => client.id = clients::insert(tx, &client)?,
        }

        Ok(Mutation {
            objects: vec![client.id],
            restart_inbounds: restart,
            restart_core: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut ids = vec![3, 1, 3, 2, 1];
        dedup_ordered(&mut ids);
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
