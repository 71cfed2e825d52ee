//! Engine error taxonomy.

use thiserror::Error;

use crate::core::CoreError;
use crate::provision::ProvisionError;
use crate::store::StoreError;
use crate::validation::{CheckError, ValidationError};

pub type EngineResult<T> = Result<T, EngineError>;

/// Everything that aborts a save. Any of these means the transaction was
/// rolled back and nothing was written.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Hard adapter failure inside the save transaction.
    #[error("core {op} of '{tag}' failed: {source}")]
    Core {
        op: &'static str,
        tag: String,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl From<CheckError> for EngineError {
    fn from(e: CheckError) -> Self {
        match e {
            CheckError::Store(e) => EngineError::Store(e),
            CheckError::Invalid(e) => EngineError::Validation(e),
        }
    }
}

impl EngineError {
    pub(crate) fn core(op: &'static str, tag: &str, source: CoreError) -> Self {
        EngineError::Core {
            op,
            tag: tag.to_string(),
            source,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Parse(_) => "parse",
            EngineError::Store(_) => "store",
            EngineError::Core { .. } => "core",
            EngineError::Provision(_) => "provision",
        }
    }
}
