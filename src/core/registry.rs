//! Stack registry — closed mapping from role identifier to role profile.
//!
//! Roles differ only in the environment variable injected into the workload,
//! so each role is one row in a flat table. Adding a role means adding a row.

use super::types::Role;
use indexmap::IndexMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Per-role strategy applied by the topology builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: Role,
    /// Variable set to `true` in the workload environment
    pub env_var: &'static str,
}

impl RoleProfile {
    /// `KEY=true` entry for the workload environment.
    pub fn env_entry(&self) -> String {
        format!("{}=true", self.env_var)
    }
}

const BUILTIN_PROFILES: [RoleProfile; 3] = [
    RoleProfile {
        role: Role::Api,
        env_var: "API_MODE",
    },
    RoleProfile {
        role: Role::Worker,
        env_var: "WORKER_MODE",
    },
    RoleProfile {
        role: Role::Service,
        env_var: "SERVICE_MODE",
    },
];

/// Resolution failure, reported separately from input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(String),
}

/// Immutable role table.
#[derive(Debug, Clone)]
pub struct StackRegistry {
    profiles: IndexMap<&'static str, RoleProfile>,
}

impl StackRegistry {
    /// The built-in roles: api, worker, service.
    pub fn builtin() -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|p| (p.role.as_str(), *p))
            .collect();
        Self { profiles }
    }

    /// Look up a role by identifier.
    pub fn resolve(&self, role: &str) -> Result<&RoleProfile, ResolveError> {
        self.profiles
            .get(role.trim())
            .ok_or_else(|| ResolveError::UnknownRole(role.to_string()))
    }

    /// Registered profiles in registration order.
    pub fn profiles(&self) -> impl Iterator<Item = &RoleProfile> {
        self.profiles.values()
    }
}

/// Process-wide registry, built on first use and never mutated.
pub fn global() -> &'static StackRegistry {
    static REGISTRY: OnceLock<StackRegistry> = OnceLock::new();
    REGISTRY.get_or_init(StackRegistry::builtin)
}
