//! Entity definitions.
//!
//! # Data Flow
//! ```text
//! save payload (canonical fields + protocol fields, one JSON object)
//!     → <Entity>::from_payload (canonical fields split out, rest → extension bag)
//!     → store/ (canonical columns + bag as JSON text)
//!     → <Entity>::to_config (canonical fields merged back over the bag)
//!     → core document / live core
//! ```
//!
//! # Design Decisions
//! - The extension bag is opaque: it is never searched for canonical keys,
//!   only stripped of them on the way in and merged on the way out
//! - Derived data (`out_json`, client links, endpoint `ext`) is carried on the
//!   structs but never taken from user payloads

pub mod change;
pub mod client;
pub mod endpoint;
pub mod inbound;
pub mod outbound;
pub mod tls;

pub use change::{ChangeRecord, NewChange};
pub use client::{Client, Descriptor, LOCAL_ORIGIN};
pub use endpoint::Endpoint;
pub use inbound::Inbound;
pub use outbound::Outbound;
pub use tls::TlsProfile;

use serde_json::{Map, Value};

use crate::validation::ValidationError;

/// Opaque protocol-specific fields of an entity.
pub type ExtensionBag = Map<String, Value>;

/// Parse a payload object into an entity, reporting serde failures as
/// malformed payloads for `class`.
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(
    class: &'static str,
    payload: Value,
) -> Result<T, ValidationError> {
    if !payload.is_object() {
        return Err(ValidationError::Malformed {
            class,
            reason: "expected a JSON object".to_string(),
        });
    }
    serde_json::from_value(payload).map_err(|e| ValidationError::Malformed {
        class,
        reason: e.to_string(),
    })
}

/// Remove canonical keys that leaked into the bag.
pub(crate) fn strip_keys(bag: &mut ExtensionBag, keys: &[&str]) {
    for key in keys {
        bag.remove(*key);
    }
}

/// Require a non-empty string field.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}
