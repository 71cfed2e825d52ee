//! Transactional configuration reconciliation engine.
//!
//! # Responsibilities
//! - Apply every mutating request inside one store transaction
//! - Recompute derived data (client descriptors, inbound out-json)
//! - Hot-patch the live core, in-transaction where a failure must roll back
//!   and post-commit where it must not
//! - Keep the change log and the in-memory watermark
//!
//! # Data Flow
//! ```text
//! SaveRequest
//!     → Validating: class/action check, payload parse, uniqueness, conflicts
//!     → Mutating:   store writes, derived data, in-transaction core add/remove
//!     → change record appended, COMMIT            (any error → ROLLBACK)
//!     → watermark advanced
//!     → Patching:   inbound restarts / auto-start / full restart
//!     → SaveOutcome { committed, convergence }
//! ```
//!
//! # Design Decisions
//! - One engine handle per process owns the watermark and the core adapter;
//!   nothing is global
//! - Post-commit failures never turn a committed save into an error; they are
//!   logged and reported in `Convergence`
//! - The store may run ahead of the core until the next restart or resync

mod clients;
mod converge;
mod endpoints;
mod error;
mod feed;
mod inbounds;
mod outbounds;
mod outcome;
mod request;
mod save;
mod settings;
mod sweep;
mod tls;
mod watermark;

pub use error::{EngineError, EngineResult};
pub use feed::ChangeQuery;
pub use outcome::{Committed, Convergence, PatchFailure, SaveOutcome};
pub use request::{Action, ObjectClass, SaveRequest};
pub use sweep::SweepReport;
pub use watermark::Watermark;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use serde_json::Value;

use crate::assembler::{self, CoreDocument};
use crate::core::CoreAdapter;
use crate::model::{Client, Inbound};
use crate::provision::PeerProvisioner;
use crate::store::{self, Store};
use crate::validation::ValidationError;

/// Handle through which every configuration change flows.
pub struct Engine {
    store: Arc<Store>,
    core: Arc<dyn CoreAdapter>,
    provisioner: Arc<dyn PeerProvisioner>,
    watermark: Watermark,
    /// Id of the newest change record the live core is known to reflect.
    /// Records past it that this process did not apply belong to other
    /// writers and are picked up by `follow_changes`.
    synced: AtomicI64,
    hostname: String,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        core: Arc<dyn CoreAdapter>,
        provisioner: Arc<dyn PeerProvisioner>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            store,
            core,
            provisioner,
            watermark: Watermark::default(),
            synced: AtomicI64::new(0),
            hostname: hostname.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn core(&self) -> &dyn CoreAdapter {
        self.core.as_ref()
    }

    pub(crate) fn mark_synced(&self, change_id: i64) {
        self.synced.fetch_max(change_id, Ordering::AcqRel);
    }

    pub(crate) fn synced(&self) -> i64 {
        self.synced.load(Ordering::Acquire)
    }

    /// Full core document from the stored base (or `base_override`).
    pub fn assemble(&self, base_override: Option<&str>) -> EngineResult<CoreDocument> {
        self.store.read(|conn| assembler::assemble(conn, base_override))
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn parse_json(payload: &str) -> EngineResult<Value> {
    Ok(serde_json::from_str(payload)?)
}

/// Target of a delete payload: an id number or a tag/name string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Handle {
    Id(i64),
    Name(String),
}

impl Handle {
    pub(crate) fn from_payload(class: &'static str, payload: &Value) -> Result<Self, ValidationError> {
        match payload {
            Value::Number(n) => n.as_i64().map(Handle::Id).ok_or_else(|| ValidationError::Malformed {
                class,
                reason: format!("invalid id {n}"),
            }),
            Value::String(s) if !s.is_empty() => Ok(Handle::Name(s.clone())),
            _ => Err(ValidationError::Malformed {
                class,
                reason: "delete payload must be an id or a tag".to_string(),
            }),
        }
    }

    pub(crate) fn not_found(&self, class: &'static str) -> ValidationError {
        let key = match self {
            Handle::Id(id) => id.to_string(),
            Handle::Name(name) => name.clone(),
        };
        ValidationError::NotFound { class, key }
    }
}

/// Inbounds of `client` that carry users, in the client's declared order.
pub(crate) fn linked_inbounds(conn: &Connection, client: &Client) -> store::StoreResult<Vec<Inbound>> {
    Ok(store::inbounds::get_many(conn, &client.inbounds)?
        .into_iter()
        .filter(Inbound::has_users)
        .collect())
}

/// Regenerates and stores the descriptors of every client linked to
/// `inbound_id`.
pub(crate) fn resync_clients(conn: &Connection, inbound_id: i64) -> store::StoreResult<usize> {
    let linked = store::clients::list_linked(conn, inbound_id)?;
    for client in &linked {
        let inbounds = linked_inbounds(conn, client)?;
        let links = crate::links::regenerate(client, &inbounds);
        store::clients::set_links(conn, client.id, &client.inbounds, &links)?;
    }
    Ok(linked.len())
}
