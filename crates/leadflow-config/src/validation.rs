// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: ordered grade thresholds, positive TTLs and batch sizes,
//! non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::LeadflowConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LeadflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.scoring.grade_hot <= config.scoring.grade_warm {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring.grade_hot ({}) must be greater than scoring.grade_warm ({})",
                config.scoring.grade_hot, config.scoring.grade_warm
            ),
        });
    }

    if config.scoring.inactivity_days <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring.inactivity_days must be positive, got {}",
                config.scoring.inactivity_days
            ),
        });
    }

    if config.scoring.history_cap == 0 {
        errors.push(ConfigError::Validation {
            message: "scoring.history_cap must be at least 1".to_string(),
        });
    }

    if config.dispatch.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.batch_size must be at least 1".to_string(),
        });
    }

    if config.dispatch.lock_ttl_secs <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.lock_ttl_secs must be positive, got {}",
                config.dispatch.lock_ttl_secs
            ),
        });
    }

    if config.dispatch.lock_key.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "dispatch.lock_key must not be empty".to_string(),
        });
    }

    if config.optout.token_max_age_secs <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "optout.token_max_age_secs must be positive, got {}",
                config.optout.token_max_age_secs
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
