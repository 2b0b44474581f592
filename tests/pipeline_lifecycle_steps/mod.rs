//! Step definitions for pipeline lifecycle BDD scenarios.

pub mod world;

mod then;
