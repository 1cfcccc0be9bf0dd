//! Configuration for paperlog.
//!
//! Settings are layered: `paperlog.toml`, then environment variables, then
//! CLI flags.

use crate::agent::{AgentConfig, DEFAULT_AGENT_CMD};
use crate::workflow::controller::DEFAULT_CHECKPOINT_DIR;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "paperlog.toml";

/// Default output directory for final posts and checkpoints.
pub const DEFAULT_OUTPUT_DIR: &str = "pdf/PaperLog";

const ENV_AGENT_CMD: &str = "PAPERLOG_AGENT_CMD";
const ENV_STAGE_TIMEOUT: &str = "PAPERLOG_STAGE_TIMEOUT_SECS";
const ENV_SKIP_PERMISSIONS: &str = "SKIP_PERMISSIONS";

/// `[agent]`: how stage agents are launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    /// Agent command (default: "claude")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments passed to every agent invocation
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,
    /// Pass `--dangerously-skip-permissions` to the agent
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Per-stage deadline in seconds; unset waits indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,
}

fn default_agent_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: None,
            args: default_agent_args(),
            skip_permissions: default_skip_permissions(),
            working_dir: None,
            stage_timeout_secs: None,
        }
    }
}

/// `[output]`: where results land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub default_dir: PathBuf,
    /// Checkpoint directory, relative to the output directory
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_checkpoint_dir() -> String {
    DEFAULT_CHECKPOINT_DIR.to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            default_dir: default_output_dir(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

/// The complete paperlog.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperlogToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub output: OutputSection,
}

impl PaperlogToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse paperlog.toml")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize paperlog.toml")
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Agent command (env → file → default).
    pub fn agent_cmd(&self) -> String {
        std::env::var(ENV_AGENT_CMD)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.agent.command.clone())
            .unwrap_or_else(|| DEFAULT_AGENT_CMD.to_string())
    }

    /// Whether to skip agent permission prompts (env overrides file).
    pub fn skip_permissions(&self) -> bool {
        if let Ok(env_val) = std::env::var(ENV_SKIP_PERMISSIONS) {
            return env_val != "false";
        }
        self.agent.skip_permissions
    }

    /// Stage deadline (env → file). Zero or unset means no deadline.
    pub fn stage_timeout(&self) -> Option<Duration> {
        let secs = std::env::var(ENV_STAGE_TIMEOUT)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(self.agent.stage_timeout_secs)?;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref cmd) = self.agent.command
            && cmd.trim().is_empty()
        {
            warnings.push("agent.command is empty; the default 'claude' will be used".to_string());
        }

        if self.agent.stage_timeout_secs == Some(0) {
            warnings.push("agent.stage_timeout_secs = 0 disables the stage deadline".to_string());
        }

        if let Ok(raw) = std::env::var(ENV_STAGE_TIMEOUT)
            && raw.parse::<u64>().is_err()
        {
            warnings.push(format!(
                "Invalid {} '{}': expected whole seconds, ignoring",
                ENV_STAGE_TIMEOUT, raw
            ));
        }

        if let Some(ref dir) = self.agent.working_dir
            && !dir.is_dir()
        {
            warnings.push(format!(
                "agent.working_dir '{}' does not exist",
                dir.display()
            ));
        }

        let checkpoint_dir = Path::new(&self.output.checkpoint_dir);
        if self.output.checkpoint_dir.trim().is_empty() {
            warnings.push("output.checkpoint_dir is empty".to_string());
        } else if checkpoint_dir.is_absolute()
            || checkpoint_dir
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            warnings.push(format!(
                "output.checkpoint_dir '{}' should be a plain directory name under the output directory",
                self.output.checkpoint_dir
            ));
        }

        warnings
    }
}

/// Runtime configuration: the parsed file plus CLI overrides.
#[derive(Debug, Clone)]
pub struct PaperlogConfig {
    /// Where the file was read from, if one was found
    pub config_path: Option<PathBuf>,
    pub toml: PaperlogToml,
    pub verbose: bool,
    /// CLI override for the output directory
    pub cli_output_dir: Option<PathBuf>,
}

impl PaperlogConfig {
    /// Load from `config_path`, or from `./paperlog.toml` when not given.
    ///
    /// An explicit path must exist; the implicit one is optional.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let (config_path, toml) = match config_path {
            Some(path) => {
                let toml = PaperlogToml::load(&path)?;
                (Some(path), toml)
            }
            None => {
                let path = PathBuf::from(CONFIG_FILE);
                if path.exists() {
                    let toml = PaperlogToml::load(&path)?;
                    (Some(path), toml)
                } else {
                    (None, PaperlogToml::default())
                }
            }
        };

        Ok(Self {
            config_path,
            toml,
            verbose: false,
            cli_output_dir: None,
        })
    }

    /// Load and apply CLI overrides.
    pub fn with_cli_args(
        config_path: Option<PathBuf>,
        verbose: bool,
        output_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.verbose = verbose;
        config.cli_output_dir = output_dir;
        Ok(config)
    }

    /// Output directory (CLI → file → default).
    pub fn output_dir(&self) -> PathBuf {
        self.cli_output_dir
            .clone()
            .unwrap_or_else(|| self.toml.output.default_dir.clone())
    }

    pub fn checkpoint_dir_name(&self) -> &str {
        &self.toml.output.checkpoint_dir
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.toml.stage_timeout()
    }

    /// Agent launch settings with env overrides applied.
    pub fn agent_config(&self) -> AgentConfig {
        let mut agent = AgentConfig::default()
            .with_command(&self.toml.agent_cmd())
            .with_args(self.toml.agent.args.clone())
            .with_skip_permissions(self.toml.skip_permissions());
        if let Some(ref dir) = self.toml.agent.working_dir {
            agent = agent.with_working_dir(dir.clone());
        }
        agent
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
