//! Change log records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable entry of the change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: i64,
    /// Unix milliseconds.
    pub date_time: i64,
    pub actor: String,
    /// Object class the change applied to.
    pub key: String,
    pub action: String,
    /// Raw payload that produced the change.
    pub obj: Value,
}

/// A change about to be appended.
#[derive(Debug, Clone)]
pub struct NewChange<'a> {
    pub date_time: i64,
    pub actor: &'a str,
    pub key: &'a str,
    pub action: &'a str,
    pub obj: &'a str,
}
