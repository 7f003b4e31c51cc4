use async_trait::async_trait;
use indoc::indoc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::capabilities::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::systems::truncate_output;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_OUTPUT_CHARS: usize = 20_000;

/// Runs shell commands (linters, build tools, test runners) in the project
pub struct ShellSystem {
    tools: Vec<Tool>,
    root: PathBuf,
    timeout: Duration,
}

impl ShellSystem {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let run_command = Tool::new(
            "run_command",
            "Run a command in a bash shell and return its combined stdout and stderr.",
            json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The bash command to run."
                    },
                    "working_dir": {
                        "type": "string",
                        "default": null,
                        "description": "Directory to run in, relative to the project root. Defaults to the project root."
                    }
                }
            }),
        );

        Self {
            tools: vec![run_command],
            root: root.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Hard wall-clock cap on each command
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_command(&self, params: Value) -> AgentResult<String> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidParameters("Missing 'command' parameter".into()))?;
        let working_dir = match params.get("working_dir").and_then(Value::as_str) {
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        };
        if !working_dir.is_dir() {
            return Err(AgentError::InvalidParameters(format!(
                "The directory '{}' does not exist",
                working_dir.display()
            )));
        }

        debug!(command, dir = %working_dir.display(), "running command");

        // Redirect stderr to stdout to interleave outputs
        let child = Command::new("bash")
            .arg("-c")
            .arg(format!("exec 2>&1\n{}", command))
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::ExecutionError(format!("Failed to start command: {}", e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| AgentError::ExecutionError(e.to_string()))?,
            Err(_) => {
                return Err(AgentError::ExecutionError(format!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs_f32()
                )))
            }
        };

        let text = truncate_output(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_CHARS);
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AgentError::ExecutionError(format!(
                "Command exited with status {}:\n{}",
                code, text
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl System for ShellSystem {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run analyzers, build tools and tests from the command line"
    }

    fn instructions(&self) -> &str {
        indoc! {"
            Commands run in the project root with a time limit; long running servers will be stopped.
            Use the files capabilities for reading and writing files instead of cat or echo.
        "}
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> AgentResult<String> {
        match tool_name {
            "run_command" => self.run_command(arguments).await,
            _ => Err(AgentError::ToolNotFound(tool_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_in_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let system = ShellSystem::new(dir.path());

        let output = system
            .call("run_command", json!({"command": "ls"}))
            .await
            .unwrap();
        assert_eq!(output.trim(), "marker.txt");
    }

    #[tokio::test]
    async fn test_stderr_and_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let system = ShellSystem::new(dir.path());

        let err = system
            .call("run_command", json!({"command": "echo broken >&2; exit 3"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command exited with status 3:\nbroken\n"
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let system = ShellSystem::new(dir.path()).with_timeout(Duration::from_millis(200));

        let err = system
            .call("run_command", json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let system = ShellSystem::new(dir.path());

        let err = system
            .call("run_command", json!({"command": "ls", "working_dir": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }
}
