//! Core deployment logic — types, registry, topology, synthesis, orchestration.

pub mod deploy;
pub mod digest;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod synth;
pub mod topology;
pub mod types;
