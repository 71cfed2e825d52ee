//! Depletion sweep: disables clients that are over quota or expired.

use serde::Serialize;
use tracing::info;

use crate::engine::{now_ms, Convergence, Engine, EngineError, EngineResult};
use crate::model::NewChange;
use crate::observability::metrics;
use crate::store::{changes, clients};

/// Actor recorded on the sweep's change records.
pub const SWEEP_ACTOR: &str = "DepleteJob";

/// What one sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Names of the clients disabled by this pass.
    pub disabled: Vec<String>,
    pub convergence: Convergence,
}

impl Engine {
    /// Disables every enabled client past its byte cap or expiry, in one
    /// transaction, and restarts the inbounds they were linked to.
    pub fn deplete_clients(&self) -> EngineResult<SweepReport> {
        let (disabled, inbound_ids, timestamp, head) = self.store.transaction(|tx| {
            let timestamp = now_ms();
            let pending = changes::count_after(tx, self.synced())?;
            let mut head = None;
            let depleted = clients::list_depleted(tx, timestamp / 1000)?;

            let mut names = Vec::with_capacity(depleted.len());
            let mut inbound_ids = Vec::new();
            for client in depleted {
                clients::set_enable(tx, client.id, false)?;
                let obj = serde_json::to_string(&client.name)?;
                let change_id = changes::append(
                    tx,
                    &NewChange {
                        date_time: timestamp,
                        actor: SWEEP_ACTOR,
                        key: "clients",
                        action: "disable",
                        obj: &obj,
                    },
                )?;
                if pending == 0 {
                    head = Some(change_id);
                }
                inbound_ids.extend(client.inbounds);
                names.push(client.name);
            }
            Ok::<_, EngineError>((names, inbound_ids, timestamp, head))
        })?;

        let mut report = SweepReport {
            disabled,
            convergence: Convergence::default(),
        };
        if report.disabled.is_empty() {
            return Ok(report);
        }

        self.watermark.advance(timestamp);
        metrics::record_depleted(report.disabled.len());
        info!(clients = ?report.disabled, "Depleted clients disabled");

        if self.core.is_running() {
            self.restart_inbounds(&inbound_ids, &mut report.convergence);
        }
        // Foreign records ahead of the sweep stay visible to the follower.
        if let Some(head) = head {
            self.mark_synced(head);
        }
        Ok(report)
    }
}
