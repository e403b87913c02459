//! Error types shared by the balancer, the registry and providers.

use thiserror::Error;

/// Errors returned by balancer and provider operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    /// A constructor or config section was given values it cannot work with.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provider with the same identity is already registered.
    #[error("provider '{0}' already registered")]
    ProviderAlreadyRegistered(String),

    /// The provider is not registered, or no providers are registered at all.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Every registered provider is down or saturated.
    #[error("all providers are down or overloaded")]
    MaxLoad,

    /// The provider's admission limiter was closed while a request waited on it.
    #[error("provider '{0}' closed its admission limiter")]
    ProviderClosed(String),
}

/// Result type for balancer operations.
pub type Result<T> = std::result::Result<T, BalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BalancerError::ProviderAlreadyRegistered("provider0".to_string());
        assert_eq!(err.to_string(), "provider 'provider0' already registered");

        let err = BalancerError::MaxLoad;
        assert_eq!(err.to_string(), "all providers are down or overloaded");
    }
}
