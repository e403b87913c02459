//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → ProbeSettings + SimpleProvider instances for the balancer
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Semantic checks reuse the runtime constructors so both paths agree

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BalancerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProbeConfig;
pub use schema::ProviderConfig;
