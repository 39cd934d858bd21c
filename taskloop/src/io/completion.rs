//! Completion client abstraction and backends.
//!
//! The [`CompletionClient`] trait decouples the loop from the actual model
//! backend. Tests use scripted clients that return predetermined responses
//! without network access. Real backends: a chat-style HTTP API, a legacy
//! completion-style HTTP API, and a local model subprocess.

use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::io::config::{AgentConfig, Backend, ModelConfig, RetryConfig};
use crate::io::process::run_command_with_timeout;

/// Wall-clock budget for one local-model invocation.
const LOCAL_TIMEOUT: Duration = Duration::from_secs(600);
/// Captured-output bound for local-model stdout.
const LOCAL_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Abstraction over completion backends: given a prompt, return the trimmed
/// text completion.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// One attempt's outcome inside a retry loop.
pub enum Attempt<T> {
    Done(T),
    /// The backend signalled a transient rate limit; try again.
    RateLimited,
}

/// Bounded fixed-delay retry for transient completion failures.
///
/// Only rate limits are retried; any other failure propagates immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            delay: Duration::from_secs(cfg.delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it completes, fails hard, or the attempt budget
    /// is spent.
    pub fn run<T>(
        &self,
        what: &str,
        mut attempt: impl FnMut() -> Result<Attempt<T>>,
    ) -> Result<T> {
        for n in 1..=self.max_attempts {
            match attempt()? {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited => {
                    warn!(
                        attempt = n,
                        max_attempts = self.max_attempts,
                        delay_secs = self.delay.as_secs(),
                        "{what} rate limited, backing off"
                    );
                    if n < self.max_attempts {
                        thread::sleep(self.delay);
                    }
                }
            }
        }
        Err(anyhow!(
            "{what} still rate limited after {} attempts",
            self.max_attempts
        ))
    }
}

/// Which hosted API shape to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpApi {
    Chat,
    Completion,
}

/// Client for the hosted chat/completion backends.
pub struct HttpCompletionClient {
    http: Client,
    api: HttpApi,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl HttpCompletionClient {
    pub fn new(model: &ModelConfig, retry: RetryPolicy, api_key: String) -> Result<Self> {
        let api = match model.backend {
            Backend::Chat => HttpApi::Chat,
            Backend::Completion => HttpApi::Completion,
            Backend::Local => return Err(anyhow!("local backend is not an HTTP client")),
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            api,
            base_url: model.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.name.clone(),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            retry,
        })
    }

    fn request_parts(&self, prompt: &str) -> (&'static str, Value) {
        match self.api {
            HttpApi::Chat => (
                "chat/completions",
                chat_body(&self.model, self.temperature, self.max_tokens, prompt),
            ),
            HttpApi::Completion => (
                "completions",
                completion_body(&self.model, self.temperature, self.max_tokens, prompt),
            ),
        }
    }
}

impl CompletionClient for HttpCompletionClient {
    #[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        self.retry.run("completion request", || {
            let (path, body) = self.request_parts(prompt);
            let response = self
                .http
                .post(format!("{}/{}", self.base_url, path))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .context("send completion request")?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                return Ok(Attempt::RateLimited);
            }
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().unwrap_or_default();
                return Err(anyhow!("completion request failed with {status}: {text}"));
            }

            let value: Value = response.json().context("parse completion response")?;
            let text = match self.api {
                HttpApi::Chat => extract_chat_text(&value)?,
                HttpApi::Completion => extract_completion_text(&value)?,
            };
            debug!(response_bytes = text.len(), "completion received");
            Ok(Attempt::Done(text.trim().to_string()))
        })
    }
}

/// Client that invokes a local model binary, passing the prompt as `-p`.
pub struct LocalCompletionClient {
    command: Vec<String>,
}

impl LocalCompletionClient {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(anyhow!("local model command must not be empty"));
        }
        Ok(Self { command })
    }
}

impl CompletionClient for LocalCompletionClient {
    #[instrument(skip_all, fields(program = %self.command[0]))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]).arg("-p").arg(prompt);
        let output = run_command_with_timeout(cmd, LOCAL_TIMEOUT, LOCAL_OUTPUT_LIMIT_BYTES)
            .context("run local model")?;
        if output.timed_out {
            return Err(anyhow!(
                "local model timed out after {}s",
                LOCAL_TIMEOUT.as_secs()
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "local model exited with status {:?}: {}",
                output.status.code(),
                output.stderr_lossy().trim()
            ));
        }
        Ok(output.stdout_lossy().trim().to_string())
    }
}

/// Build the configured backend. Hosted backends require an API key.
pub fn client_from_config(
    cfg: &AgentConfig,
    api_key: Option<String>,
) -> Result<Box<dyn CompletionClient>> {
    let retry = RetryPolicy::from(cfg.retry);
    match cfg.model.backend {
        Backend::Local => Ok(Box::new(LocalCompletionClient::new(
            cfg.model.local_command.clone(),
        )?)),
        Backend::Chat | Backend::Completion => {
            let api_key = api_key
                .ok_or_else(|| anyhow!("TASKLOOP_API_KEY is required for hosted backends"))?;
            Ok(Box::new(HttpCompletionClient::new(
                &cfg.model, retry, api_key,
            )?))
        }
    }
}

fn chat_body(model: &str, temperature: f64, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "system", "content": prompt }],
        "temperature": temperature,
        "max_tokens": max_tokens,
        "n": 1,
    })
}

fn completion_body(model: &str, temperature: f64, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "temperature": temperature,
        "max_tokens": max_tokens,
        "top_p": 1,
        "frequency_penalty": 0,
        "presence_penalty": 0,
    })
}

fn extract_chat_text(value: &Value) -> Result<String> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("chat response missing choices[0].message.content"))
}

fn extract_completion_text(value: &Value) -> Result<String> {
    value["choices"][0]["text"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("completion response missing choices[0].text"))
}
