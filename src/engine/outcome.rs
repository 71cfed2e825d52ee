//! Two-phase save results.

use serde::Serialize;

/// What the transaction made durable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Committed {
    /// Id of the appended change record.
    pub change_id: i64,
    /// Unix milliseconds the watermark was advanced to.
    pub timestamp: i64,
    /// Ids of the entities written or deleted.
    pub objects: Vec<i64>,
}

/// A post-commit core operation that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchFailure {
    pub op: &'static str,
    pub tag: String,
    pub error: String,
}

/// What the post-commit phase did to the live core.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Convergence {
    /// The core was not running and was started from the assembled document.
    pub core_started: bool,
    /// No live core is attached to this process; a daemon following the
    /// change log applies the change.
    pub deferred: bool,
    /// Tags of inbounds that were removed and re-added.
    pub restarted: Vec<String>,
    pub failures: Vec<PatchFailure>,
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, op: &'static str, tag: &str, error: impl ToString) {
        let error = error.to_string();
        tracing::error!(op, tag, error = %error, "Post-commit core patch failed");
        crate::observability::metrics::record_patch_failure(op);
        self.failures.push(PatchFailure {
            op,
            tag: tag.to_string(),
            error,
        });
    }
}

/// Result of a successful save: durably committed, maybe not converged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub committed: Committed,
    pub convergence: Convergence,
}
