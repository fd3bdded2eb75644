use crate::command::{HelmCommand, HelmError};

/// Abstraction over helm CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks
/// or fakes that simulate the filesystem effects of `helm pull`.
#[allow(async_fn_in_trait)]
pub trait HelmExecutor: Send + Sync {
    /// Execute a helm command and capture stdout.
    async fn exec(&self, command: &HelmCommand) -> Result<String, HelmError>;
}

/// Real helm CLI executor.
pub struct RealExecutor {
    binary: String,
}

impl RealExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new("helm")
    }
}

impl HelmExecutor for RealExecutor {
    async fn exec(&self, command: &HelmCommand) -> Result<String, HelmError> {
        use std::process::Stdio;

        tracing::debug!(binary = %self.binary, args = ?command.args, "running helm");

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| HelmError::NotFound {
            binary: self.binary.clone(),
            source: e,
        })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| HelmError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(HelmError::CommandFailed {
                args: command.args.clone(),
                stderr,
            })
        }
    }
}
