//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > timeout > 0, concurrency > 0)
//! - Detect duplicate provider identities
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::error::BalancerError;

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, err: BalancerError) -> Self {
        let message = match err {
            BalancerError::InvalidConfiguration(message) => message,
            other => other.to_string(),
        };
        Self {
            field: field.into(),
            message,
        }
    }
}

/// Check a parsed config, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.probe.to_settings() {
        errors.push(ValidationError::new("probe", e));
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let field = format!("providers[{i}]");
        if let Err(e) = provider.build() {
            errors.push(ValidationError::new(field.clone(), e));
        }
        if let Some(id) = &provider.id {
            if !seen.insert(id.as_str()) {
                errors.push(ValidationError::new(
                    field,
                    BalancerError::ProviderAlreadyRegistered(id.clone()),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
