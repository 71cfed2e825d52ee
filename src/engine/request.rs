//! Save requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Object class a save applies to. Doubles as the change record `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Clients,
    Tls,
    Inbounds,
    Outbounds,
    Endpoints,
    Settings,
    Config,
}

impl ObjectClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectClass::Clients => "clients",
            ObjectClass::Tls => "tls",
            ObjectClass::Inbounds => "inbounds",
            ObjectClass::Outbounds => "outbounds",
            ObjectClass::Endpoints => "endpoints",
            ObjectClass::Settings => "settings",
            ObjectClass::Config => "config",
        }
    }

    /// Actions this class accepts.
    pub fn allows(self, action: Action) -> bool {
        match self {
            ObjectClass::Clients => true,
            ObjectClass::Tls
            | ObjectClass::Inbounds
            | ObjectClass::Outbounds
            | ObjectClass::Endpoints => action != Action::AddBulk,
            ObjectClass::Settings | ObjectClass::Config => action == Action::Edit,
        }
    }
}

impl FromStr for ObjectClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clients" => ObjectClass::Clients,
            "tls" => ObjectClass::Tls,
            "inbounds" => ObjectClass::Inbounds,
            "outbounds" => ObjectClass::Outbounds,
            "endpoints" => ObjectClass::Endpoints,
            "settings" => ObjectClass::Settings,
            "config" => ObjectClass::Config,
            other => return Err(ValidationError::UnknownClass(other.to_string())),
        })
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    New,
    Edit,
    Del,
    AddBulk,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::New => "new",
            Action::Edit => "edit",
            Action::Del => "del",
            Action::AddBulk => "addbulk",
        }
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => Action::New,
            "edit" => Action::Edit,
            "del" => Action::Del,
            "addbulk" => Action::AddBulk,
            other => return Err(ValidationError::UnknownAction(other.to_string())),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutating request.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub class: ObjectClass,
    pub action: Action,
    /// Raw JSON payload, stored verbatim in the change record.
    pub payload: String,
    pub actor: String,
    /// Clients to link to a new inbound.
    pub init_users: Vec<i64>,
}

impl SaveRequest {
    pub fn new(
        class: ObjectClass,
        action: Action,
        payload: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            class,
            action,
            payload: payload.into(),
            actor: actor.into(),
            init_users: Vec::new(),
        }
    }

    pub fn with_init_users(mut self, ids: Vec<i64>) -> Self {
        self.init_users = ids;
        self
    }
}
