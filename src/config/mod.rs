//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new PipelineConfig sent to the running process
//!     → EndpointSelector swaps its candidate list
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::PipelineConfig;
pub use schema::ConfirmationConfig;
pub use schema::ConnectivityConfig;
pub use schema::EndpointsConfig;
pub use schema::RetryConfig;
pub use schema::StakingConfig;
