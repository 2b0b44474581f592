//! Adapter implementations for pipeline ports.

pub mod engine;
pub mod memory;
pub mod postgres;

mod factory;

pub use factory::RegistryProviderFactory;
