//! Provisioning orchestrator — drives init → apply against a synthesized stack.
//!
//! States: `NotStarted → Initialized → Applied | Failed`. One attempt per
//! phase, no retries. A failed apply after a successful init is reported
//! as-is; partially created infrastructure is not rolled back.

use super::types::{Phase, ProvisioningOutcome};
use crate::transport::{Engine, EngineError, ExecOutput};
use std::path::{Path, PathBuf};

/// Lifecycle state of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    NotStarted,
    Initialized,
    /// Terminal success with the apply stdout.
    Applied { output: String },
    /// Terminal failure.
    Failed(ProvisioningOutcome),
}

impl ProvisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::Failed(_))
    }
}

/// A single init/apply run against one stack directory.
pub struct ProvisionRun<'a> {
    engine: &'a dyn Engine,
    dir: PathBuf,
    label: String,
    fingerprint: String,
    state: ProvisionState,
}

impl<'a> ProvisionRun<'a> {
    /// `fingerprint` identifies the synthesized stack and is carried into `Success`.
    pub fn new(engine: &'a dyn Engine, config_dir: &Path, fingerprint: &str) -> Self {
        let label = config_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| config_dir.display().to_string());
        Self {
            engine,
            dir: config_dir.to_path_buf(),
            label,
            fingerprint: fingerprint.to_string(),
            state: ProvisionState::NotStarted,
        }
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    /// Perform the next transition. Returns false once terminal.
    pub fn advance(&mut self) -> bool {
        let next = match &self.state {
            ProvisionState::NotStarted => self.run_init(),
            ProvisionState::Initialized => self.run_apply(),
            ProvisionState::Applied { .. } | ProvisionState::Failed(_) => return false,
        };
        self.state = next;
        true
    }

    /// Advance until terminal and return the outcome.
    pub fn finish(mut self) -> ProvisioningOutcome {
        while self.advance() {}
        match self.state {
            ProvisionState::Applied { output } => ProvisioningOutcome::Success {
                applied_output: output,
                fingerprint: self.fingerprint,
            },
            ProvisionState::Failed(outcome) => outcome,
            // advance() only stops on terminal states
            ProvisionState::NotStarted | ProvisionState::Initialized => {
                ProvisioningOutcome::InternalFault {
                    message: "provisioning stopped before reaching a terminal state".to_string(),
                }
            }
        }
    }

    fn run_init(&self) -> ProvisionState {
        if !self.dir.is_dir() {
            return ProvisionState::Failed(ProvisioningOutcome::SynthesisError {
                message: format!("stack directory not found at {}", self.dir.display()),
            });
        }
        log::info!("[{}] {} init", self.label, self.engine.binary());
        match self.engine.init(&self.dir) {
            Ok(out) if out.success() => {
                log::debug!("[{}] init ok", self.label);
                ProvisionState::Initialized
            }
            Ok(out) => {
                log_failure(&self.label, Phase::Init, &out);
                ProvisionState::Failed(ProvisioningOutcome::InitError { stderr: out.stderr })
            }
            Err(e) => ProvisionState::Failed(self.engine_failure(Phase::Init, e)),
        }
    }

    fn run_apply(&self) -> ProvisionState {
        log::info!("[{}] {} apply", self.label, self.engine.binary());
        match self.engine.apply(&self.dir) {
            Ok(out) if out.success() => {
                log::info!("[{}] apply complete", self.label);
                ProvisionState::Applied { output: out.stdout }
            }
            Ok(out) => {
                log_failure(&self.label, Phase::Apply, &out);
                log::warn!(
                    "[{}] apply failed after init; resources may be partially provisioned",
                    self.label
                );
                ProvisionState::Failed(ProvisioningOutcome::ApplyError { stderr: out.stderr })
            }
            Err(e) => ProvisionState::Failed(self.engine_failure(Phase::Apply, e)),
        }
    }

    fn engine_failure(&self, phase: Phase, err: EngineError) -> ProvisioningOutcome {
        log::error!("[{}] {} failed: {}", self.label, phase, err);
        match err {
            EngineError::Missing(binary) => ProvisioningOutcome::EngineMissing { binary },
            EngineError::TimedOut(limit) => ProvisioningOutcome::TimedOut {
                phase,
                seconds: limit.as_secs(),
            },
            EngineError::Interrupted => ProvisioningOutcome::Interrupted { phase },
            other @ (EngineError::Spawn { .. } | EngineError::Io(_)) => match phase {
                Phase::Init => ProvisioningOutcome::InitError {
                    stderr: other.to_string(),
                },
                Phase::Apply => ProvisioningOutcome::ApplyError {
                    stderr: other.to_string(),
                },
            },
        }
    }
}

fn log_failure(label: &str, phase: Phase, out: &ExecOutput) {
    log::error!(
        "[{}] {} exited with {}: {}",
        label,
        phase,
        out.exit_code,
        out.stderr.trim()
    );
}

/// Run init then apply in `config_dir`.
pub fn provision(engine: &dyn Engine, config_dir: &Path, fingerprint: &str) -> ProvisioningOutcome {
    ProvisionRun::new(engine, config_dir, fingerprint).finish()
}
