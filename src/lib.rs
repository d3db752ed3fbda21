//! AguaForm — role-based container stacks, synthesized and provisioned.
//!
//! A deployment request (name, provider, image, ports, role) is mapped to a
//! resource topology, written out as Terraform JSON and applied through the
//! external engine's init → apply lifecycle.

pub mod cli;
pub mod core;
pub mod transport;
