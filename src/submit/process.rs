//! Node automation script execution
//!
//! Each destination form is driven by a Node.js browser-automation script.
//! The adapter invokes `node <script> <payload-json>` as a child process,
//! captures its full output, and enforces a wall-clock timeout. There is no
//! retry here; a failed attempt is pipeline-fatal for this request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Pipeline-fatal dispatch failures, distinct from resolution failures so
/// callers can tell "we don't know where to submit" from "we know where, but
/// submission failed"
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("AdapterMissing: no automation script for category {0}")]
    AdapterMissing(String),

    #[error("AdapterTimeout: script did not finish within {0} seconds")]
    AdapterTimeout(u64),

    #[error("AdapterCrash: {0}")]
    AdapterCrash(String),

    #[error("ContractViolation: payload missing required keys {0:?}")]
    ContractViolation(Vec<String>),
}

impl DispatchFailure {
    /// Short reason name carried into the terminal report state
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AdapterMissing(_) => "AdapterMissing",
            Self::AdapterTimeout(_) => "AdapterTimeout",
            Self::AdapterCrash(_) => "AdapterCrash",
            Self::ContractViolation(_) => "ContractViolation",
        }
    }
}

/// Raw output of a completed automation run. Tracking extraction happens in a
/// separate stage so a run can succeed while confirmation fails.
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub stdout: String,
    pub stderr: String,
}

/// Collaborator seam for form submission
#[async_trait]
pub trait SubmissionAdapter: Send + Sync {
    async fn submit(&self, payload: &serde_json::Value) -> Result<AdapterOutcome, DispatchFailure>;
}

/// Runs a single Node.js automation script as a child process
pub struct NodeScriptAdapter {
    program: String,
    script: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl NodeScriptAdapter {
    pub fn new(script: PathBuf, working_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program: "node".to_string(),
            script,
            working_dir,
            timeout,
        }
    }

    /// Replace the interpreter, for tests that substitute a shell script
    #[cfg(test)]
    fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl SubmissionAdapter for NodeScriptAdapter {
    async fn submit(&self, payload: &serde_json::Value) -> Result<AdapterOutcome, DispatchFailure> {
        if !self.script.exists() {
            return Err(DispatchFailure::AdapterMissing(
                self.script.display().to_string(),
            ));
        }

        let payload_json = payload.to_string();
        tracing::info!(
            script = %self.script.display(),
            timeout_secs = self.timeout.as_secs(),
            "executing automation script"
        );

        let child = Command::new(&self.program)
            .arg(&self.script)
            .arg(&payload_json)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(DispatchFailure::AdapterCrash(e.to_string())),
            Err(_) => return Err(DispatchFailure::AdapterTimeout(self.timeout.as_secs())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            tracing::warn!(code = %code, stderr = %stderr, "automation script failed");
            let detail = if stderr.trim().is_empty() {
                format!("script exited with code {code}")
            } else {
                format!("script exited with code {code}: {}", stderr.trim())
            };
            return Err(DispatchFailure::AdapterCrash(detail));
        }

        tracing::info!(stdout_bytes = stdout.len(), "automation script completed");
        Ok(AdapterOutcome { stdout, stderr })
    }
}
