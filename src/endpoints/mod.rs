//! RPC endpoint management.
//!
//! # Data Flow
//! ```text
//! Configured candidates (priority order)
//!     → endpoint.rs (per-candidate client and health)
//!     → selector.rs (probe in order, cache first healthy)
//!     → orchestrator uses the cached endpoint until it fails
//! ```

pub mod endpoint;
pub mod selector;

pub use endpoint::Endpoint;
pub use selector::{EndpointSelector, HealthyEndpoint, SelectError};
