//! Package manager bridge - runs install/remove as subprocesses
//!
//! Binary resolution is a two-step strategy, repeated on every call: probe
//! the preferred program with its version flag, and only when that probe
//! cannot spawn or exits nonzero fall back to running it through the
//! configured wrapper (`npx pnpm ...` shape). The subprocess inherits no
//! extra timeout; a hung package manager blocks only the operation that
//! spawned it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::application::errors::PluginError;

/// Operation to run against the package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgOperation {
    Add,
    Remove,
}

impl PkgOperation {
    pub fn as_arg(&self) -> &'static str {
        match self {
            PkgOperation::Add => "add",
            PkgOperation::Remove => "remove",
        }
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct PkgOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl PkgOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short excerpt for command replies
    pub fn excerpt(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let text = text.trim();
        match text.char_indices().nth(400) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

/// Runs add/remove operations for plugin packages
#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn run(&self, op: PkgOperation, package: &str) -> Result<PkgOutcome, PluginError>;
}

/// Production bridge: preferred binary with wrapper fallback
pub struct PnpmBridge {
    program: String,
    fallback_runner: String,
    package_root: PathBuf,
}

impl PnpmBridge {
    pub fn new(
        program: impl Into<String>,
        fallback_runner: impl Into<String>,
        package_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            fallback_runner: fallback_runner.into(),
            package_root: package_root.into(),
        }
    }

    /// Probe the preferred binary. Resolution happens once per call to
    /// [`PackageManager::run`], never cached across calls.
    async fn resolve(&self) -> Vec<String> {
        let probe = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match probe {
            Ok(status) if status.success() => vec![self.program.clone()],
            Ok(status) => {
                tracing::debug!(
                    "probe of {} exited with {}, falling back to {} {}",
                    self.program,
                    status,
                    self.fallback_runner,
                    self.program
                );
                vec![self.fallback_runner.clone(), self.program.clone()]
            }
            Err(e) => {
                tracing::debug!(
                    "{} not found ({}), falling back to {} {}",
                    self.program,
                    e,
                    self.fallback_runner,
                    self.program
                );
                vec![self.fallback_runner.clone(), self.program.clone()]
            }
        }
    }
}

#[async_trait]
impl PackageManager for PnpmBridge {
    async fn run(&self, op: PkgOperation, package: &str) -> Result<PkgOutcome, PluginError> {
        let invocation = self.resolve().await;
        let (program, leading) = invocation
            .split_first()
            .ok_or_else(|| PluginError::Internal("empty package manager invocation".to_string()))?;

        tracing::info!(
            "running {} {} {} {} in {}",
            program,
            leading.join(" "),
            op.as_arg(),
            package,
            self.package_root.display()
        );

        let output = Command::new(program)
            .args(leading)
            .arg(op.as_arg())
            .arg(package)
            .current_dir(&self.package_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PluginError::SpawnFailed(format!("{}: {}", program, e)))?;

        Ok(PkgOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_when_preferred_binary_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        // `echo` exists everywhere the tests run; it accepts any arguments
        let bridge = PnpmBridge::new("nami-no-such-binary", "echo", dir.path());

        let outcome = bridge
            .run(PkgOperation::Add, "nami-plugin-ping")
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(outcome.stdout.contains("add nami-plugin-ping"));
    }

    #[tokio::test]
    async fn unresolvable_invocation_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PnpmBridge::new("nami-no-such-binary", "nami-no-such-runner", dir.path());

        let result = bridge.run(PkgOperation::Remove, "nami-plugin-ping").await;
        assert!(matches!(result, Err(PluginError::SpawnFailed(_))));
    }
}
