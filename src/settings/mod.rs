//! Settings registry.
//!
//! # Responsibilities
//! - Enumerate every recognized setting key with its default
//! - Coerce raw strings per key before they are stored
//!
//! # Design Decisions
//! - The registry is a static table; a key not in it is rejected on write
//! - Integers and booleans that fail to parse are hard errors; an unknown
//!   time zone falls back to the default with a warning
//! - `config` (the base document) and `version` are reserved and cannot be
//!   written through the settings class

use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::validation::ValidationError;

/// Key of the stored base core document.
pub const CONFIG_KEY: &str = "config";

/// Key of the schema/application version marker.
pub const VERSION_KEY: &str = "version";

/// Keys never returned by listings.
pub const HIDDEN_KEYS: &[&str] = &["secret", CONFIG_KEY, VERSION_KEY];

/// Base document used when none is stored.
pub const DEFAULT_BASE_DOCUMENT: &str = r#"{
  "log": {
    "level": "info"
  },
  "dns": {},
  "route": {
    "rules": [
      {
        "protocol": [
          "dns"
        ],
        "action": "hijack-dns"
      }
    ]
  },
  "experimental": {}
}"#;

/// How a setting's raw value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    Integer,
    Boolean,
    /// Normalized to a leading and trailing slash.
    Path,
    /// IANA time-zone name.
    Location,
    /// Managed by the engine; not writable through the settings class.
    Reserved,
}

#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub key: &'static str,
    pub kind: SettingKind,
    default: fn() -> String,
}

impl SettingSpec {
    pub fn default_value(&self) -> String {
        (self.default)()
    }
}

macro_rules! setting {
    ($key:literal, $kind:ident, $default:expr) => {
        SettingSpec {
            key: $key,
            kind: SettingKind::$kind,
            default: || String::from($default),
        }
    };
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub static REGISTRY: &[SettingSpec] = &[
    setting!("webListen", Text, ""),
    setting!("webDomain", Text, ""),
    setting!("webPort", Integer, "2095"),
    SettingSpec {
        key: "secret",
        kind: SettingKind::Text,
        default: random_secret,
    },
    setting!("webCertFile", Text, ""),
    setting!("webKeyFile", Text, ""),
    setting!("webPath", Path, "/app/"),
    setting!("webURI", Text, ""),
    setting!("sessionMaxAge", Integer, "0"),
    setting!("trafficAge", Integer, "30"),
    setting!("timeLocation", Location, "Asia/Tehran"),
    setting!("subListen", Text, ""),
    setting!("subPort", Integer, "2096"),
    setting!("subPath", Path, "/sub/"),
    setting!("subDomain", Text, ""),
    setting!("subCertFile", Text, ""),
    setting!("subKeyFile", Text, ""),
    setting!("subUpdates", Integer, "12"),
    setting!("subEncode", Boolean, "true"),
    setting!("subShowInfo", Boolean, "false"),
    setting!("subURI", Text, ""),
    setting!("subJsonExt", Text, ""),
    setting!("panelLanguage", Text, "en"),
    setting!("panelTheme", Text, "light"),
    setting!("config", Reserved, DEFAULT_BASE_DOCUMENT),
    setting!("version", Reserved, env!("CARGO_PKG_VERSION")),
];

pub fn lookup(key: &str) -> Option<&'static SettingSpec> {
    REGISTRY.iter().find(|spec| spec.key == key)
}

/// Default value for a registered key.
pub fn default_value(key: &str) -> Option<String> {
    lookup(key).map(SettingSpec::default_value)
}

fn normalize_path(value: &str) -> String {
    let trimmed = value.trim();
    let mut path = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        path.push('/');
    }
    path.push_str(trimmed);
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Validates and normalizes `value` for `key`, returning the string to store.
pub fn coerce(key: &str, value: &str) -> Result<String, ValidationError> {
    let spec = lookup(key).ok_or_else(|| ValidationError::UnknownSetting(key.to_string()))?;
    let invalid = |reason: String| ValidationError::InvalidSetting {
        key: key.to_string(),
        reason,
    };

    match spec.kind {
        SettingKind::Text => Ok(value.to_string()),
        SettingKind::Integer => value
            .trim()
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|e| invalid(format!("expected an integer: {e}"))),
        SettingKind::Boolean => parse_bool(value)
            .map(|b| b.to_string())
            .ok_or_else(|| invalid(format!("expected a boolean, got '{value}'"))),
        SettingKind::Path => Ok(normalize_path(value)),
        SettingKind::Location => match chrono_tz::Tz::from_str(value.trim()) {
            Ok(tz) => Ok(tz.name().to_string()),
            Err(_) => {
                let fallback = spec.default_value();
                tracing::warn!(key, value, fallback = %fallback, "Unknown time zone, using default");
                Ok(fallback)
            }
        },
        SettingKind::Reserved => Err(invalid("reserved key".to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
