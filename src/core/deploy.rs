//! Deployment service — validate → resolve → build → synthesize → provision.
//!
//! `deploy` never returns an error and never lets a panic escape: every
//! failure becomes a [`ProvisioningOutcome`]. Each attempt gets a fresh
//! temporary workspace that is removed on every exit path.

use super::orchestrator;
use super::parser;
use super::registry::{self, StackRegistry};
use super::synth;
use super::topology;
use super::types::*;
use crate::transport::Engine;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "aguaform-";

/// Entry point into the deployment pipeline.
#[derive(Clone)]
pub struct DeploymentService {
    registry: &'static StackRegistry,
    engine: Arc<dyn Engine>,
    workspace_root: Option<PathBuf>,
}

impl DeploymentService {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            registry: registry::global(),
            engine,
            workspace_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: Option<PathBuf>) -> Self {
        self.workspace_root = root;
        self
    }

    /// Run one deployment to completion.
    pub fn deploy(&self, request: &DeploymentRequest) -> ProvisioningOutcome {
        let errors = parser::validate_request(request);
        if !errors.is_empty() {
            let message = parser::join_errors(&errors);
            log::warn!("rejected request '{}': {}", request.name.trim(), message);
            return ProvisioningOutcome::ValidationError { message };
        }

        let profile = match self.registry.resolve(&request.role) {
            Ok(p) => *p,
            Err(_) => {
                log::warn!(
                    "rejected request '{}': unknown role '{}'",
                    request.name.trim(),
                    request.role
                );
                return ProvisioningOutcome::UnknownRole {
                    role: request.role.clone(),
                };
            }
        };

        let Some(provider) = Provider::parse(&request.provider) else {
            log::warn!(
                "rejected request '{}': unsupported provider '{}'",
                request.name.trim(),
                request.provider
            );
            return ProvisioningOutcome::UnsupportedProvider {
                provider: request.provider.clone(),
            };
        };

        let stack_id = StackId::derive(&request.name, profile.role);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_pipeline(request, provider, &profile)
        }));

        let outcome = result.unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            log::error!("[{}] internal fault: {}", stack_id, message);
            ProvisioningOutcome::InternalFault { message }
        });

        if outcome.is_success() {
            log::info!("[{}] deployed", stack_id);
        } else {
            log::warn!("[{}] deploy ended with {}", stack_id, outcome.kind());
        }
        outcome
    }

    /// Run several deployments concurrently, each on its own blocking task.
    /// Outcomes are returned in input order.
    pub fn deploy_all(&self, requests: Vec<DeploymentRequest>) -> Vec<ProvisioningOutcome> {
        if requests.len() <= 1 {
            return requests.iter().map(|r| self.deploy(r)).collect();
        }

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("cannot start worker runtime ({}), deploying sequentially", e);
                return requests.iter().map(|r| self.deploy(r)).collect();
            }
        };

        runtime.block_on(async {
            let handles: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    let service = self.clone();
                    tokio::task::spawn_blocking(move || service.deploy(&request))
                })
                .collect();

            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles {
                outcomes.push(match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => ProvisioningOutcome::InternalFault {
                        message: format!("deploy task failed: {}", e),
                    },
                });
            }
            outcomes
        })
    }

    fn run_pipeline(
        &self,
        request: &DeploymentRequest,
        provider: Provider,
        profile: &registry::RoleProfile,
    ) -> ProvisioningOutcome {
        let workspace = match self.create_workspace() {
            Ok(ws) => ws,
            Err(e) => {
                return ProvisioningOutcome::SynthesisError {
                    message: format!("cannot create workspace: {}", e),
                }
            }
        };

        let outcome = self.provision_in(workspace.path(), request, provider, profile);

        let path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            log::warn!("failed to remove workspace {}: {}", path.display(), e);
        } else {
            log::debug!("removed workspace {}", path.display());
        }
        outcome
    }

    fn provision_in(
        &self,
        workspace: &Path,
        request: &DeploymentRequest,
        provider: Provider,
        profile: &registry::RoleProfile,
    ) -> ProvisioningOutcome {
        let topology = topology::build_for(request, provider, profile);
        let stack_id = topology.stack_id().clone();

        if topology.is_empty() {
            log::warn!(
                "[{}] provider '{}' has no resource mapping yet; stack provisions nothing",
                stack_id,
                provider
            );
        }

        let stack = match synth::synthesize(&topology, workspace) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[{}] synthesis failed: {}", stack_id, e);
                return ProvisioningOutcome::SynthesisError {
                    message: e.to_string(),
                };
            }
        };
        log::info!("[{}] synthesized ({})", stack_id, stack.fingerprint);

        let expected = synth::stack_dir(workspace, &stack_id);
        if !expected.is_dir() {
            return ProvisioningOutcome::SynthesisError {
                message: format!("stack directory not found at {}", expected.display()),
            };
        }

        orchestrator::provision(self.engine.as_ref(), &expected, &stack.fingerprint)
    }

    fn create_workspace(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        match &self.workspace_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
