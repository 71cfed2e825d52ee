//! Outbound saves.

use rusqlite::Connection;
use serde_json::Value;
use tracing::warn;

use crate::engine::save::Mutation;
use crate::engine::{Action, Engine, EngineError, EngineResult, Handle};
use crate::model::Outbound;
use crate::store::{self, outbounds};
use crate::validation::{check_tag_unique, TaggedClass, ValidationError};

impl Engine {
    pub(super) fn save_outbounds(
        &self,
        tx: &Connection,
        action: Action,
        payload: Value,
    ) -> EngineResult<Mutation> {
        match action {
            Action::New | Action::Edit => {
                let mut outbound = Outbound::from_payload(payload)?;
                let previous = if action == Action::Edit {
                    Some(outbounds::get(tx, outbound.id)?.ok_or_else(|| ValidationError::NotFound {
                        class: "outbound",
                        key: outbound.id.to_string(),
                    })?)
                } else {
                    None
                };
                check_tag_unique(tx, TaggedClass::Outbound, &outbound.tag, previous.as_ref().map(|p| p.id))?;

                if self.core.is_running() {
                    if let Some(previous) = &previous {
                        if let Err(e) = self.core.remove_outbound(&previous.tag) {
                            if !e.is_not_found() {
                                warn!(tag = %previous.tag, error = %e, "Removing previous outbound failed");
                            }
                        }
                    }
                    self.core
                        .add_outbound(&outbound.to_config())
                        .map_err(|e| EngineError::core("add outbound", &outbound.tag, e))?;
                }

                match previous {
                    Some(_) => outbounds::update(tx, &outbound)?,
                    None => outbound.id = outbounds::insert(tx, &outbound)?,
                }
                Ok(Mutation::touched(outbound.id))
            }
            Action::Del => {
                let handle = Handle::from_payload("outbound", &payload)?;
                let outbound = match &handle {
                    Handle::Id(id) => outbounds::get(tx, *id)?,
                    Handle::Name(tag) => outbounds::get_by_tag(tx, tag)?,
                }
                .ok_or_else(|| handle.not_found("outbound"))?;

                // Route rules may still point at the tag; the core's own
                // refusal must not block removing the record.
                if self.core.is_running() {
                    if let Err(e) = self.core.remove_outbound(&outbound.tag) {
                        if !e.is_not_found() {
                            warn!(tag = %outbound.tag, error = %e, "Core kept outbound");
                        }
                    }
                }
                store::delete_by_id(tx, "outbounds", outbound.id)?;
                Ok(Mutation::touched(outbound.id))
            }
            Action::AddBulk => Err(ValidationError::UnsupportedAction {
                class: "outbounds",
                action: action.as_str(),
            }
            .into()),
        }
    }
}
