//! Agent configuration stored as a TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values. The API
/// credential is deliberately not part of this file; it comes from the
/// `TASKLOOP_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Objective to accomplish when none is given on the command line.
    pub objective: String,

    /// Directory all file actions are rooted under.
    pub workspace_dir: String,

    /// Maximum number of fix cycles before the run gives up.
    pub max_fix_cycles: u32,

    pub model: ModelConfig,
    pub retry: RetryConfig,
    pub run: RunConfig,
}

/// Which completion backend to talk to and with what parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Chat-style API: the whole prompt travels as one system message.
    #[default]
    Chat,
    /// Legacy completion-style API with a bare prompt string.
    Completion,
    /// Local model invoked as a subprocess.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Backend family. The upstream scripts sniffed this from the model
    /// name (`llama*` local, `gpt-*` chat, anything else completion); here
    /// it is explicit configuration.
    pub backend: Backend,

    /// Model identifier sent to the hosted backends.
    pub name: String,

    pub temperature: f64,

    pub max_tokens: u32,

    /// Base URL for the hosted backends.
    pub base_url: String,

    /// Argv for the local backend; the prompt is appended as `-p <prompt>`.
    pub local_command: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            name: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            base_url: "https://api.openai.com/v1".to_string(),
            local_command: vec!["llama/main".to_string()],
        }
    }
}

/// Retry policy for transient completion failures (rate limits).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts before a rate-limited call becomes an error.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 10,
        }
    }
}

/// How Run File executes its targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Interpreter argv prefix; the resolved script path is appended.
    pub command: Vec<String>,
    /// Wall-clock budget for one script before it is killed.
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            objective: String::new(),
            workspace_dir: "Workspace".to_string(),
            max_fix_cycles: 3,
            model: ModelConfig::default(),
            retry: RetryConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workspace_dir.trim().is_empty() {
            return Err(anyhow!("workspace_dir must not be empty"));
        }
        if self.model.max_tokens == 0 {
            return Err(anyhow!("model.max_tokens must be > 0"));
        }
        if self.model.backend == Backend::Local
            && (self.model.local_command.is_empty()
                || self.model.local_command[0].trim().is_empty())
        {
            return Err(anyhow!(
                "model.local_command must be a non-empty array for the local backend"
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if self.run.command.is_empty() || self.run.command[0].trim().is_empty() {
            return Err(anyhow!("run.command must be a non-empty array"));
        }
        if self.run.timeout_secs == 0 {
            return Err(anyhow!("run.timeout_secs must be > 0"));
        }
        if self.run.output_limit_bytes == 0 {
            return Err(anyhow!("run.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taskloop.toml");
        let mut cfg = AgentConfig::default();
        cfg.objective = "create a.txt with text hello".to_string();
        cfg.max_fix_cycles = 1;
        cfg.model.backend = Backend::Completion;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taskloop.toml");
        fs::write(&path, "objective = \"do a thing\"\n[model]\nbackend = \"local\"\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.objective, "do a thing");
        assert_eq!(cfg.model.backend, Backend::Local);
        assert_eq!(cfg.run, RunConfig::default());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut cfg = AgentConfig::default();
        cfg.run.timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn validate_rejects_empty_interpreter() {
        let mut cfg = AgentConfig::default();
        cfg.run.command = vec![String::new()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_local_command_for_local_backend() {
        let mut cfg = AgentConfig::default();
        cfg.model.backend = Backend::Local;
        cfg.model.local_command = Vec::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("local_command"));
    }
}
