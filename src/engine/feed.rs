//! Change feed for polling observers.

use tracing::debug;

use crate::engine::{now_ms, Engine, EngineResult};
use crate::model::ChangeRecord;
use crate::store::changes;
use crate::validation::ValidationError;

/// Filters of a change-log read.
#[derive(Debug, Clone, Default)]
pub struct ChangeQuery {
    pub actor: Option<String>,
    /// Object class (`clients`, `inbounds`, ...).
    pub class: Option<String>,
    pub limit: i64,
}

impl Engine {
    /// Whether anything changed after `since` (unix milliseconds).
    ///
    /// No value means the caller has seen nothing yet. When the in-memory
    /// watermark is behind (fresh process, or writes from another process),
    /// the log itself is consulted and the watermark catches up.
    pub fn check_changes(&self, since: Option<&str>) -> EngineResult<bool> {
        let since = match since.map(str::trim) {
            None | Some("") => return Ok(true),
            Some(text) => text
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidWatermark(text.to_string()))?,
        };
        if self.watermark.get() > since {
            return Ok(true);
        }

        let newer = self.store.read(|conn| changes::count_since(conn, since))?;
        if newer > 0 {
            debug!(since, newer, "Change log is ahead of the watermark");
            self.watermark.advance(now_ms());
            return Ok(true);
        }
        Ok(false)
    }

    /// Newest-first change records.
    pub fn changes(&self, query: &ChangeQuery) -> EngineResult<Vec<ChangeRecord>> {
        Ok(self.store.read(|conn| {
            changes::query(conn, query.actor.as_deref(), query.class.as_deref(), query.limit)
        })?)
    }

    pub fn reset_changes(&self) -> EngineResult<usize> {
        let cleared = self.store.transaction(|tx| changes::clear(tx))?;
        tracing::info!(cleared, "Change log reset");
        Ok(cleared)
    }

    pub fn watermark(&self) -> i64 {
        self.watermark.get()
    }
}
