//! Pipeline control plane: CI/CD pipeline orchestration.
//!
//! This crate submits pipeline runs to pluggable execution engines, tracks
//! their status, expands parameterised templates into runnable
//! configurations, and manages the active engine configuration of each
//! workspace.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage, engines, and secrets
//! - **Adapters**: Concrete implementations of ports (database, engines, etc.)
//!
//! # Modules
//!
//! - [`pipeline`]: Pipeline runs, templates, and provider configuration
//! - [`config`]: Environment-driven control plane settings
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod pipeline;
pub mod telemetry;
