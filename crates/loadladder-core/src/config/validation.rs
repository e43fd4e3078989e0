use std::collections::{BTreeSet, HashSet};

use crate::config::model::{LadderConfig, MAX_DURATION_SECS};
use crate::error::LadderError;

/// Validate a [`LadderConfig`] and return every problem found.
///
/// An empty `Vec` means the configuration is usable.
pub fn validate_config(config: &LadderConfig) -> Vec<LadderError> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(LadderError::Validation("host must not be empty".to_string()));
    }

    if config.protocol != "http" && config.protocol != "https" {
        errors.push(LadderError::Validation(format!(
            "protocol must be http or https (got: {})",
            config.protocol
        )));
    }

    if config.duration_secs == 0 {
        errors.push(LadderError::Validation(
            "duration_secs must be at least 1".to_string(),
        ));
    } else if config.duration_secs > MAX_DURATION_SECS {
        errors.push(LadderError::Validation(format!(
            "duration_secs must be at most {MAX_DURATION_SECS} (got: {})",
            config.duration_secs
        )));
    }

    if config.request_timeout_secs == 0 {
        errors.push(LadderError::Validation(
            "request_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.probe_timeout_secs == 0 {
        errors.push(LadderError::Validation(
            "probe_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.user_loads.is_empty() {
        errors.push(LadderError::Validation(
            "user_loads must contain at least one level".to_string(),
        ));
    }

    if config.user_loads.contains(&0) {
        errors.push(LadderError::Validation(
            "user_loads entries must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let repeated: BTreeSet<u32> = config
        .user_loads
        .iter()
        .copied()
        .filter(|users| !seen.insert(*users))
        .collect();
    if !repeated.is_empty() {
        let levels: Vec<String> = repeated.iter().map(u32::to_string).collect();
        errors.push(LadderError::Validation(format!(
            "user_loads must not repeat a level (repeated: {})",
            levels.join(", ")
        )));
    }

    if config.endpoints.is_empty() {
        errors.push(LadderError::Validation(
            "endpoints must contain at least one path".to_string(),
        ));
    }

    for endpoint in &config.endpoints {
        if !endpoint.starts_with('/') {
            errors.push(LadderError::Validation(format!(
                "endpoint '{endpoint}' must start with '/'"
            )));
        }
    }

    errors
}

/// Like [`validate_config`] but fails on the first problem.
pub fn ensure_valid(config: &LadderConfig) -> Result<(), LadderError> {
    match validate_config(config).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
