//! Save orchestration.

use rusqlite::Connection;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::engine::{
    now_ms, Committed, Engine, EngineError, EngineResult, ObjectClass, SaveOutcome, SaveRequest,
};
use crate::model::NewChange;
use crate::observability::metrics;
use crate::store::changes;
use crate::validation::ValidationError;

/// What a class mutation left for the post-commit phase.
#[derive(Debug, Default)]
pub(crate) struct Mutation {
    /// Ids of the entities written or deleted.
    pub objects: Vec<i64>,
    /// Inbounds whose user lists changed.
    pub restart_inbounds: Vec<i64>,
    /// The base document changed: stop and start the core.
    pub restart_core: bool,
}

impl Mutation {
    pub(crate) fn touched(id: i64) -> Self {
        Self {
            objects: vec![id],
            ..Self::default()
        }
    }

    pub(crate) fn merge(&mut self, other: Mutation) {
        self.objects.extend(other.objects);
        self.restart_inbounds.extend(other.restart_inbounds);
        self.restart_core |= other.restart_core;
    }
}

impl Engine {
    /// Applies one mutating request atomically and converges the core.
    ///
    /// `Err` means nothing was written. `Ok` means the change is durable;
    /// whether the live core followed is reported in the outcome.
    pub fn save(&self, request: SaveRequest) -> EngineResult<SaveOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "save",
            %request_id,
            class = %request.class,
            action = %request.action,
            actor = %request.actor,
        );
        let _enter = span.enter();

        let result = self.save_in_span(&request);
        let label = match &result {
            Ok(outcome) if outcome.convergence.is_converged() => "committed",
            Ok(_) => "diverged",
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Save rejected");
                e.kind()
            }
        };
        metrics::record_save(request.class.as_str(), request.action.as_str(), label);
        result
    }

    fn save_in_span(&self, request: &SaveRequest) -> EngineResult<SaveOutcome> {
        if !request.class.allows(request.action) {
            return Err(ValidationError::UnsupportedAction {
                class: request.class.as_str(),
                action: request.action.as_str(),
            }
            .into());
        }

        let (mutation, committed, pending) = self.store.transaction(|tx| {
            // Records the core has not seen yet, written by another process.
            let pending = changes::count_after(tx, self.synced())?;
            let mutation = self.mutate(tx, request)?;
            let timestamp = now_ms();
            let change_id = changes::append(
                tx,
                &NewChange {
                    date_time: timestamp,
                    actor: &request.actor,
                    key: request.class.as_str(),
                    action: request.action.as_str(),
                    obj: &request.payload,
                },
            )?;
            let committed = Committed {
                change_id,
                timestamp,
                objects: mutation.objects.clone(),
            };
            Ok::<_, EngineError>((mutation, committed, pending))
        })?;

        self.watermark.advance(committed.timestamp);
        info!(
            change_id = committed.change_id,
            objects = ?committed.objects,
            "Save committed"
        );

        let convergence = self.converge(&mutation);
        if pending == 0 {
            self.mark_synced(committed.change_id);
        } else {
            debug!(pending, "Unapplied changes precede this save, left to the follower");
        }
        debug!(converged = convergence.is_converged(), "Post-commit phase done");
        Ok(SaveOutcome {
            committed,
            convergence,
        })
    }

    fn mutate(&self, tx: &Connection, request: &SaveRequest) -> EngineResult<Mutation> {
        let action = request.action;
        let payload = || super::parse_json(&request.payload);
        match request.class {
            ObjectClass::Clients => self.save_clients(tx, action, payload()?),
            ObjectClass::Tls => self.save_tls(tx, action, payload()?),
            ObjectClass::Inbounds => self.save_inbounds(tx, action, payload()?, &request.init_users),
            ObjectClass::Outbounds => self.save_outbounds(tx, action, payload()?),
            ObjectClass::Endpoints => self.save_endpoints(tx, action, payload()?),
            ObjectClass::Settings => self.save_settings(tx, payload()?),
            // The base document is stored as sent, not re-serialized.
            ObjectClass::Config => self.save_config(tx, &request.payload),
        }
    }
}
