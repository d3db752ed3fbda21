//! Local process engine: runs the provisioning binary as a child process.
//!
//! Each call drives a `tokio::process` child on a current-thread runtime. The
//! whole `wait_with_output` future (exit plus draining both pipes) is bounded
//! by the timeout and raced against the cancel flag, so a background process
//! that inherits the pipes cannot stall the caller. The child is killed on
//! drop.

use super::{Engine, EngineError, ExecOutput};
use crate::core::types::EngineSettings;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Engine backed by a local executable (terraform by default).
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    binary: String,
    init_args: Vec<String>,
    apply_args: Vec<String>,
    timeout: Option<Duration>,
    cancel: Arc<AtomicBool>,
}

impl ProcessEngine {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            init_args: settings.init_args.clone(),
            apply_args: settings.apply_args.clone(),
            timeout: settings.timeout(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancel flag (set by the Ctrl-C handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the engine binary with `args`, optionally in `cwd`.
    pub fn run(&self, args: &[String], cwd: Option<&Path>) -> Result<ExecOutput, EngineError> {
        if self.cancel.load(Ordering::SeqCst) {
            log::debug!("interrupt pending, not starting {}", self.binary);
            return Err(EngineError::Interrupted);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async(args, cwd))
    }

    async fn run_async(
        &self,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<ExecOutput, EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        log::trace!("exec {} {}", self.binary, args.join(" "));

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::Missing(self.binary.clone())
            } else {
                EngineError::Spawn {
                    binary: self.binary.clone(),
                    source: e,
                }
            }
        })?;

        let output = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                    Ok(result) => result.map_err(EngineError::from),
                    Err(_) => Err(EngineError::TimedOut(limit)),
                },
                None => child.wait_with_output().await.map_err(EngineError::from),
            }
        };

        let output = tokio::select! {
            result = output => result?,
            _ = cancelled(&self.cancel) => return Err(EngineError::Interrupted),
        };

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Engine for ProcessEngine {
    fn binary(&self) -> &str {
        &self.binary
    }

    fn init(&self, dir: &Path) -> Result<ExecOutput, EngineError> {
        self.run(&self.init_args, Some(dir))
    }

    fn apply(&self, dir: &Path) -> Result<ExecOutput, EngineError> {
        self.run(&self.apply_args, Some(dir))
    }

    fn version(&self) -> Result<ExecOutput, EngineError> {
        self.run(&["--version".to_string()], None)
    }
}

/// Resolves once the flag is raised.
async fn cancelled(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}
