//! Pre-write validation and cross-entity conflict checks.
//!
//! # Responsibilities
//! - Reject malformed payloads before any store write
//! - Enforce per-class tag and name uniqueness
//! - Check tunnel-peer shape and pairwise-disjoint address ranges
//!
//! # Design Decisions
//! - Checks read through a `&Connection`, so they see the uncommitted state
//!   of the save transaction they run in
//! - Every failure names the field, tag or range that caused it

pub mod cidr;
pub mod peers;
pub mod tags;

pub use cidr::IpRange;
pub use peers::{check_disjoint_ranges, check_peer_shape};
pub use tags::{check_name_unique, check_tag_unique, CheckError, NamedClass, TaggedClass};

use thiserror::Error;

/// A rejected request. Always raised before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed {class} payload: {reason}")]
    Malformed { class: &'static str, reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{class} tag '{tag}' is already in use")]
    DuplicateTag { class: &'static str, tag: String },

    #[error("{class} name '{name}' is already in use")]
    DuplicateName { class: &'static str, name: String },

    #[error("{class} '{key}' not found")]
    NotFound { class: &'static str, key: String },

    #[error("client links unknown inbound id {0}")]
    UnknownInbound(i64),

    #[error("tls profile {id} is used by inbounds {inbounds:?}")]
    TlsInUse { id: i64, inbounds: Vec<String> },

    #[error("peer {index}: {reason}")]
    InvalidPeer { index: usize, reason: String },

    #[error("address range {range} overlaps {existing} of endpoint '{tag}'")]
    RangeConflict {
        range: String,
        existing: String,
        tag: String,
    },

    #[error("invalid address range '{0}'")]
    InvalidRange(String),

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("action '{action}' is not supported for {class}")]
    UnsupportedAction {
        class: &'static str,
        action: &'static str,
    },

    #[error("unknown object class '{0}'")]
    UnknownClass(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid watermark '{0}'")]
    InvalidWatermark(String),
}
