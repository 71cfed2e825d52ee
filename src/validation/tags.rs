//! Tag and name uniqueness.

use rusqlite::Connection;

use crate::store::{self, StoreError};
use crate::validation::ValidationError;

/// Classes whose records are addressed by tag in the live core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggedClass {
    Inbound,
    Outbound,
    Endpoint,
}

impl TaggedClass {
    fn table(self) -> &'static str {
        match self {
            TaggedClass::Inbound => "inbounds",
            TaggedClass::Outbound => "outbounds",
            TaggedClass::Endpoint => "endpoints",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaggedClass::Inbound => "inbound",
            TaggedClass::Outbound => "outbound",
            TaggedClass::Endpoint => "endpoint",
        }
    }
}

/// Classes whose records are addressed by a unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedClass {
    Client,
    Tls,
}

impl NamedClass {
    fn table(self) -> &'static str {
        match self {
            NamedClass::Client => "clients",
            NamedClass::Tls => "tls",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NamedClass::Client => "client",
            NamedClass::Tls => "tls profile",
        }
    }
}

/// Outcome of a check that needs the store: either the store failed or the
/// candidate was rejected.
#[derive(Debug)]
pub enum CheckError {
    Store(StoreError),
    Invalid(ValidationError),
}

impl From<StoreError> for CheckError {
    fn from(e: StoreError) -> Self {
        CheckError::Store(e)
    }
}

impl From<ValidationError> for CheckError {
    fn from(e: ValidationError) -> Self {
        CheckError::Invalid(e)
    }
}

/// Rejects `tag` when another record of `class` holds it.
///
/// `self_id` is the id of the record being edited, `None` for new records.
pub fn check_tag_unique(
    conn: &Connection,
    class: TaggedClass,
    tag: &str,
    self_id: Option<i64>,
) -> Result<(), CheckError> {
    match store::lookup_id(conn, class.table(), "tag", tag)? {
        Some(owner) if Some(owner) != self_id => Err(ValidationError::DuplicateTag {
            class: class.name(),
            tag: tag.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// Name uniqueness for clients and TLS profiles.
pub fn check_name_unique(
    conn: &Connection,
    class: NamedClass,
    name: &str,
    self_id: Option<i64>,
) -> Result<(), CheckError> {
    match store::lookup_id(conn, class.table(), "name", name)? {
        Some(owner) if Some(owner) != self_id => Err(ValidationError::DuplicateName {
            class: class.name(),
            name: name.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}
