//! Post-commit convergence of the live core.
//!
//! Nothing here can fail a save: the store already holds the new state, so
//! every error is logged and folded into the returned [`Convergence`].

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assembler;
use crate::core::CoreError;
use crate::engine::save::Mutation;
use crate::engine::{now_ms, Convergence, Engine, EngineResult};
use crate::store::{changes, inbounds, StoreError};

impl Engine {
    /// Starts the core from the stored state if it is not running yet and
    /// takes the current log head as applied.
    pub fn boot(&self) -> EngineResult<Convergence> {
        let latest = self.store.read(|conn| changes::latest_id(conn))?;
        let mut convergence = Convergence::default();
        if !self.core.is_running() {
            self.start_core(&mut convergence);
        }
        if convergence.is_converged() {
            self.mark_synced(latest);
        }
        Ok(convergence)
    }

    /// Restarts the core when the change log holds records past the synced
    /// id, e.g. saves made by another process on the same store.
    ///
    /// `None` when the core is already up to date.
    pub fn follow_changes(&self) -> EngineResult<Option<Convergence>> {
        let synced = self.synced();
        let (newer, latest) = self.store.read(|conn| {
            Ok::<_, StoreError>((changes::count_after(conn, synced)?, changes::latest_id(conn)?))
        })?;
        if newer == 0 {
            return Ok(None);
        }

        info!(newer, after = synced, latest, "Unapplied changes in the log, resyncing core");
        let mut convergence = Convergence::default();
        self.restart_core(&mut convergence);
        self.watermark.advance(now_ms());
        // A failed restart is retried on the next pass.
        if convergence.is_converged() {
            self.mark_synced(latest);
        }
        Ok(Some(convergence))
    }

    pub(super) fn converge(&self, mutation: &Mutation) -> Convergence {
        let mut convergence = Convergence::default();
        if mutation.restart_core {
            self.restart_core(&mut convergence);
        } else if !self.core.is_running() {
            self.start_core(&mut convergence);
        } else if !mutation.restart_inbounds.is_empty() {
            self.restart_inbounds(&mutation.restart_inbounds, &mut convergence);
        }
        convergence
    }

    /// Removes and re-adds each inbound so its user list is rebuilt.
    ///
    /// Ids with no row (deleted in the same save) are skipped.
    pub(super) fn restart_inbounds(&self, ids: &[i64], convergence: &mut Convergence) {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let configs: Vec<(String, Value)> = match self.store.read(|conn| {
            inbounds::get_many(conn, &ids)?
                .iter()
                .map(|inbound| Ok((inbound.tag.clone(), assembler::inbound_document(conn, inbound)?)))
                .collect::<crate::store::StoreResult<Vec<_>>>()
        }) {
            Ok(configs) => configs,
            Err(e) => {
                convergence.fail("load inbounds", "*", e);
                return;
            }
        };

        for (tag, config) in configs {
            if let Err(e) = self.core.remove_inbound(&tag) {
                if !e.is_not_found() {
                    warn!(%tag, error = %e, "Removing inbound before restart failed");
                }
            }
            match self.core.add_inbound(&config) {
                Ok(()) => {
                    debug!(%tag, "Inbound restarted");
                    convergence.restarted.push(tag);
                }
                Err(e) => convergence.fail("restart inbound", &tag, e),
            }
        }
    }

    /// Starts a stopped core from the freshly assembled document.
    pub(super) fn start_core(&self, convergence: &mut Convergence) {
        let document = match self.assemble(None) {
            Ok(document) => document,
            Err(e) => {
                convergence.fail("assemble", "core", e);
                return;
            }
        };
        match self.core.start(&document) {
            Ok(()) => {
                info!(
                    inbounds = document.inbounds.len(),
                    outbounds = document.outbounds.len(),
                    endpoints = document.endpoints.len(),
                    "Core started"
                );
                convergence.core_started = true;
            }
            Err(CoreError::Unavailable(reason)) => {
                debug!(%reason, "No live core, convergence deferred");
                convergence.deferred = true;
            }
            Err(e) => convergence.fail("start", "core", e),
        }
    }

    fn restart_core(&self, convergence: &mut Convergence) {
        if self.core.is_running() {
            if let Err(e) = self.core.stop() {
                convergence.fail("stop", "core", e);
                return;
            }
        }
        self.start_core(convergence);
    }
}
