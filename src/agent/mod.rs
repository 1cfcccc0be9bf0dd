//! Production stage invoker backed by an external agent CLI.
//!
//! Each stage call spawns the configured command, writes the role prompt to
//! its stdin and parses the JSON object it prints.

pub mod parse;
pub mod prompts;

use crate::errors::StageError;
use crate::workflow::{StageInvoker, StageRequest, StageResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default agent command.
pub const DEFAULT_AGENT_CMD: &str = "claude";

/// How to launch the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub command: String,
    /// Arguments passed before the permission flag.
    pub args: Vec<String>,
    /// Append `--dangerously-skip-permissions`.
    pub skip_permissions: bool,
    pub working_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_AGENT_CMD.to_string(),
            args: vec!["--print".to_string()],
            skip_permissions: true,
            working_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

pub struct AgentInvoker {
    config: AgentConfig,
}

impl AgentInvoker {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run the agent once with `prompt` on stdin and return its stdout.
    async fn run_agent(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);

        if self.config.skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }

        if let Some(ref working_dir) = self.config.working_dir {
            cmd.current_dir(working_dir);
        }

        // A stage deadline drops this future; take the process down with it.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn agent '{}'", self.config.command))?;

        // Feed stdin while stdout drains so a chatty agent can't fill the pipe.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context("Failed to wait for agent process")?;
        if !output.status.success() {
            anyhow::bail!(
                "agent process exited with code {}",
                output.status.code().unwrap_or(-1)
            );
        }
        // An agent may answer without reading the whole prompt.
        match fed {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(e).context("Failed to write prompt to stdin");
            }
            _ => {}
        }

        String::from_utf8(output.stdout).context("Agent output is not valid UTF-8")
    }
}

#[async_trait]
impl StageInvoker for AgentInvoker {
    async fn invoke(&self, request: StageRequest) -> Result<StageResponse, StageError> {
        let role = request.role();
        let prompt = prompts::build(&request);
        debug!(%role, prompt_chars = prompt.len(), "invoking agent");

        let output = self
            .run_agent(&prompt)
            .await
            .map_err(|e| StageError::new(role, format!("{:#}", e)))?;

        parse::parse_response(role, &output).map_err(|e| StageError::new(role, format!("{:#}", e)))
    }
}
