//! Network health subsystem.
//!
//! # Data Flow
//! ```text
//! Route check (InterfaceSignal) ──┐
//!                                 ├─→ online? → state change → ConnectivityEvent
//! getHealth probe (timeout) ──────┘                         └→ EndpointSelector::invalidate
//! ```
//!
//! Endpoint-level health lives with the endpoints themselves; this module only
//! answers whether the client can reach the network at all.

pub mod connectivity;

pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityState, InterfaceSignal, RouteSignal};
