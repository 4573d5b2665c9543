//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → each section handed to the component that owns it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new client
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackoffStrategy, BootstrapConfig, CacheConfig, CacheStrategy, CircuitBreakerConfig,
    ClientConfig, FetchConfig, LogFormat, ObservabilityConfig, PoolConfig, RateLimitConfig,
    RetryConfig, TimeoutConfig,
};
