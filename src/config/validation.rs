//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation issues, not just the first
//! - Validation is a pure function: ControlConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ControlConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ControlConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();
    let mut issue = |field: &'static str, message: &str| {
        issues.push(ConfigIssue {
            field,
            message: message.to_string(),
        })
    };

    if config.store.path.trim().is_empty() {
        issue("store.path", "must not be empty");
    }
    if config.engine.hostname.trim().is_empty() {
        issue("engine.hostname", "must not be empty");
    }
    if config.sweep.enabled && config.sweep.interval_secs == 0 {
        issue("sweep.interval_secs", "must be greater than 0");
    }
    if config.follower.enabled && config.follower.interval_secs == 0 {
        issue("follower.interval_secs", "must be greater than 0");
    }
    if matches!(&config.core.snapshot_path, Some(p) if p.trim().is_empty()) {
        issue("core.snapshot_path", "must not be empty when set");
    }
    if config.provisioning.enabled {
        if url::Url::parse(&config.provisioning.api_url).is_err() {
            issue("provisioning.api_url", "is not a valid URL");
        }
        if config.provisioning.timeout_secs == 0 {
            issue("provisioning.timeout_secs", "must be greater than 0");
        }
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        issue("observability.log_level", "must be one of trace, debug, info, warn, error");
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issue("observability.metrics_address", "is not a socket address");
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
