//! Provisioning engine transport — the subprocess contract behind init/apply.
//!
//! The orchestrator only sees the [`Engine`] trait. [`local::ProcessEngine`]
//! runs the real binary; tests substitute a scripted engine.

pub mod local;

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Captured output of one engine invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failure to obtain an exit status from the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("provisioning engine '{0}' not found")]
    Missing(String),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine timed out after {0:?}")]
    TimedOut(Duration),

    #[error("engine run interrupted")]
    Interrupted,
}

/// External provisioning engine.
pub trait Engine: Send + Sync {
    /// Executable name, for diagnostics.
    fn binary(&self) -> &str;

    /// Run the init phase with `dir` as working directory.
    fn init(&self, dir: &Path) -> Result<ExecOutput, EngineError>;

    /// Run the apply phase (auto-approved) with `dir` as working directory.
    fn apply(&self, dir: &Path) -> Result<ExecOutput, EngineError>;

    /// Run the `--version` availability probe.
    fn version(&self) -> Result<ExecOutput, EngineError>;
}

/// Probe engine availability. Returns the first line of the version banner.
pub fn probe(engine: &dyn Engine) -> Result<String, String> {
    let out = engine.version().map_err(|e| e.to_string())?;
    if !out.success() {
        return Err(format!(
            "{} --version exited with {}: {}",
            engine.binary(),
            out.exit_code,
            out.stderr.trim()
        ));
    }
    Ok(out.stdout.lines().next().unwrap_or_default().trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeEngine, Reply};
    use super::*;

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput { exit_code: 0, stdout: "ok".into(), stderr: "".into() };
        assert!(ok.success());
        let fail = ExecOutput { exit_code: 1, stdout: "".into(), stderr: "err".into() };
        assert!(!fail.success());
        let sig = ExecOutput { exit_code: -1, stdout: "".into(), stderr: "".into() };
        assert!(!sig.success());
    }

    #[test]
    fn test_probe_first_line() {
        let engine = FakeEngine::new();
        assert_eq!(probe(&engine).unwrap(), "Terraform v1.9.0");
    }

    #[test]
    fn test_probe_missing() {
        let engine = FakeEngine::new().with_version(Reply::Missing);
        let err = probe(&engine).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_probe_nonzero_exit() {
        let engine = FakeEngine::new().with_version(Reply::fail(2, "broken install"));
        let err = probe(&engine).unwrap_err();
        assert!(err.contains("exited with 2"));
        assert!(err.contains("broken install"));
    }

    #[test]
    fn test_engine_error_display() {
        assert_eq!(
            EngineError::Missing("terraform".into()).to_string(),
            "provisioning engine 'terraform' not found"
        );
        assert_eq!(EngineError::Interrupted.to_string(), "engine run interrupted");
    }
}
