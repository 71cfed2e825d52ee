//! Live proxy core adapter.
//!
//! # Responsibilities
//! - Define the narrow interface the engine patches the live core through
//! - Classify adapter failures (not-found is soft, everything else is hard)
//!
//! # Design Decisions
//! - Calls are synchronous: they run inside the save transaction and may
//!   block for the core's own apply step
//! - `add_*` replaces an existing entry under the same tag, so a restart is
//!   remove-then-add and idempotent
//! - The adapter receives fully assembled JSON; it never reads the store

mod detached;
mod registry;

pub use detached::DetachedCore;
pub use registry::RegistryCore;

use serde_json::Value;
use thiserror::Error;

use crate::assembler::CoreDocument;

/// Failures reported by a core adapter.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The core holds no entry under this tag. Callers treat it as soft.
    #[error("{kind} '{tag}' not found in core")]
    NotFound { kind: &'static str, tag: String },

    #[error("core is not running")]
    NotRunning,

    /// No live core is attached to this process.
    #[error("core unavailable: {0}")]
    Unavailable(String),

    #[error("core rejected {kind}: {reason}")]
    Rejected { kind: &'static str, reason: String },

    #[error("core I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Narrow interface to the live proxy core.
pub trait CoreAdapter: Send + Sync {
    fn is_running(&self) -> bool;

    /// Starts the core with a full document.
    fn start(&self, document: &CoreDocument) -> CoreResult<()>;

    fn stop(&self) -> CoreResult<()>;

    fn add_inbound(&self, config: &Value) -> CoreResult<()>;
    fn remove_inbound(&self, tag: &str) -> CoreResult<()>;

    fn add_outbound(&self, config: &Value) -> CoreResult<()>;
    fn remove_outbound(&self, tag: &str) -> CoreResult<()>;

    fn add_endpoint(&self, config: &Value) -> CoreResult<()>;
    fn remove_endpoint(&self, tag: &str) -> CoreResult<()>;
}
