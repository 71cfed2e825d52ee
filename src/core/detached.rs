use serde_json::Value;

use crate::assembler::CoreDocument;
use crate::core::{CoreAdapter, CoreError, CoreResult};

/// Adapter for processes without a live core (one-shot CLI runs).
///
/// Never running, so saves skip every in-transaction patch; the post-commit
/// auto-start fails softly and convergence is left to the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedCore;

impl DetachedCore {
    fn unavailable<T>(&self) -> CoreResult<T> {
        Err(CoreError::Unavailable("no core attached".into()))
    }
}

impl CoreAdapter for DetachedCore {
    fn is_running(&self) -> bool {
        false
    }

    fn start(&self, _document: &CoreDocument) -> CoreResult<()> {
        self.unavailable()
    }

    fn stop(&self) -> CoreResult<()> {
        self.unavailable()
    }

    fn add_inbound(&self, _config: &Value) -> CoreResult<()> {
        self.unavailable()
    }

    fn remove_inbound(&self, _tag: &str) -> CoreResult<()> {
        self.unavailable()
    }

    fn add_outbound(&self, _config: &Value) -> CoreResult<()> {
        self.unavailable()
    }

    fn remove_outbound(&self, _tag: &str) -> CoreResult<()> {
        self.unavailable()
    }

    fn add_endpoint(&self, _config: &Value) -> CoreResult<()> {
        self.unavailable()
    }

    fn remove_endpoint(&self, _tag: &str) -> CoreResult<()> {
        self.unavailable()
    }
}
