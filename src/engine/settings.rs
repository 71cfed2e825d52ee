//! Settings and base-document saves, plus the settings service.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde_json::Value;

use crate::assembler::CoreDocument;
use crate::engine::save::Mutation;
use crate::engine::{Engine, EngineResult};
use crate::settings::{self as registry, SettingKind, CONFIG_KEY, HIDDEN_KEYS};
use crate::store;
use crate::validation::ValidationError;

fn raw_value(key: &str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ValidationError::InvalidSetting {
            key: key.to_string(),
            reason: format!("expected a scalar, got {other}"),
        }),
    }
}

impl Engine {
    /// Flat `{key: value}` map; every key is coerced before anything is
    /// written.
    pub(super) fn save_settings(&self, tx: &Connection, payload: Value) -> EngineResult<Mutation> {
        let Value::Object(entries) = payload else {
            return Err(ValidationError::Malformed {
                class: "settings",
                reason: "expected an object of key/value pairs".into(),
            }
            .into());
        };

        let mut coerced = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            let raw = raw_value(key, value)?;
            coerced.push((key, registry::coerce(key, &raw)?));
        }
        for (key, value) in &coerced {
            store::settings::upsert(tx, key, value)?;
        }
        tracing::debug!(keys = coerced.len(), "Settings written");
        Ok(Mutation::default())
    }

    /// Replaces the base document. The core is restarted after commit.
    pub(super) fn save_config(&self, tx: &Connection, payload: &str) -> EngineResult<Mutation> {
        CoreDocument::parse(payload)?;
        store::settings::upsert(tx, CONFIG_KEY, payload)?;
        Ok(Mutation {
            restart_core: true,
            ..Mutation::default()
        })
    }

    /// Every visible setting, with missing keys filled from (and persisted
    /// as) their defaults.
    pub fn settings(&self) -> EngineResult<BTreeMap<String, String>> {
        self.store.transaction(|tx| {
            let mut all = store::settings::all(tx)?;
            for spec in registry::REGISTRY {
                if spec.kind == SettingKind::Reserved || all.contains_key(spec.key) {
                    continue;
                }
                let value = spec.default_value();
                store::settings::upsert(tx, spec.key, &value)?;
                all.insert(spec.key.to_string(), value);
            }
            all.retain(|key, _| !HIDDEN_KEYS.contains(&key.as_str()));
            Ok(all)
        })
    }

    /// Drops every stored setting, the base document included.
    pub fn reset_settings(&self) -> EngineResult<usize> {
        let cleared = self.store.transaction(|tx| store::settings::clear(tx))?;
        tracing::info!(cleared, "Settings reset to defaults");
        Ok(cleared)
    }
}
