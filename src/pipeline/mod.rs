//! CI/CD pipeline orchestration.
//!
//! Submits pipeline runs to pluggable execution engines, tracks their status
//! through a monotonic state machine, expands parameterised templates into
//! runnable configurations, and keeps one active engine configuration per
//! workspace. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
