//! Task dispatch and the four action handlers.
//!
//! A handler performs one side effect (filesystem write, read, subprocess
//! run, or a research question) and records what happened in the cycle
//! memory. Handler failures are fatal for the task only: the dispatcher
//! logs them and the run continues with the remaining list.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use crate::core::action::{Action, ActionRequest, HeaderError, parse_action};
use crate::core::memory::CycleMemory;
use crate::core::task::{Task, join_raw};
use crate::io::completion::CompletionClient;
use crate::io::config::RunConfig;
use crate::io::process::run_command_with_timeout;
use crate::io::prompt::PromptEngine;
use crate::io::workspace::Workspace;

/// Collaborators every handler may need.
pub struct ExecutionContext<'a> {
    pub client: &'a dyn CompletionClient,
    pub workspace: &'a Workspace,
    pub prompts: &'a PromptEngine,
    pub run: &'a RunConfig,
}

/// What happened to a single dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { action: Action },
    /// The header could not be parsed; nothing was executed.
    Skipped { error: HeaderError },
    /// The handler started but failed; the run continues.
    Failed { action: Action, error: String },
}

/// Dispatch one task to its handler.
///
/// `task_list` is the full list the task came from; the research handler
/// re-reads it as question context.
#[instrument(skip_all, fields(task_id = %task.id))]
pub fn execute_task(
    ctx: &ExecutionContext<'_>,
    task: &Task,
    task_list: &[Task],
    memory: &mut CycleMemory,
) -> TaskOutcome {
    let request = match parse_action(task) {
        Ok(request) => request,
        Err(error) => {
            warn!(raw = %task.raw.trim(), %error, "task skipped");
            return TaskOutcome::Skipped { error };
        }
    };

    let action = request.action;
    let result = match action {
        Action::WriteFile => write_file(ctx, &request, memory),
        Action::ReadFile => read_file(ctx, &request, memory),
        Action::RunFile => run_file(ctx, &request, memory),
        Action::Research => research(ctx, task, task_list, memory),
    };

    match result {
        Ok(()) => TaskOutcome::Completed { action },
        Err(err) => {
            let error = format!("{err:#}");
            error!(%action, filename = %request.filename, err = %error, "task failed");
            TaskOutcome::Failed { action, error }
        }
    }
}

/// Ask the model for file content and write it under the workspace root.
///
/// Text-type files get the plain-content prompt; everything else gets the
/// code prompt, and only the first fenced block of the response is kept
/// when one is present.
fn write_file(
    ctx: &ExecutionContext<'_>,
    request: &ActionRequest,
    memory: &mut CycleMemory,
) -> Result<()> {
    let content = if is_text_extension(&request.filename) {
        let prompt = ctx
            .prompts
            .write_text(&request.explanation, memory.read_memory())?;
        ctx.client.complete(&prompt)?
    } else {
        let prompt = ctx
            .prompts
            .write_code(&request.explanation, memory.read_memory())?;
        let response = ctx.client.complete(&prompt)?;
        extract_fenced(&response)
    };
    ctx.workspace.write_file(&request.filename, &content)?;
    info!(filename = %request.filename, "file written");
    Ok(())
}

/// Load a file's contents into memory, or record that it is missing.
///
/// A missing file is deliberately surfaced as data rather than an error:
/// the interpretation step is where failures get judged.
fn read_file(
    ctx: &ExecutionContext<'_>,
    request: &ActionRequest,
    memory: &mut CycleMemory,
) -> Result<()> {
    if !request.filename.contains('.') {
        debug!(filename = %request.filename, "read target has no extension, skipping");
        return Ok(());
    }
    match ctx.workspace.read_file(&request.filename)? {
        Some(contents) => {
            info!(filename = %request.filename, bytes = contents.len(), "file read");
            memory.record_read(&format!(
                "this is what's written inside the {} file: {}",
                request.filename, contents
            ));
        }
        None => {
            warn!(filename = %request.filename, "file does not exist");
            memory.record_read(&format!(
                " {} does not exist, if the file is necessary it's a problem and the objective is not reached",
                request.filename
            ));
        }
    }
    Ok(())
}

/// Execute a `.py` target with the configured interpreter and record its
/// output. Timeouts and stderr become terminal-output facts, not errors.
fn run_file(
    ctx: &ExecutionContext<'_>,
    request: &ActionRequest,
    memory: &mut CycleMemory,
) -> Result<()> {
    if !request.filename.ends_with(".py") {
        warn!(filename = %request.filename, "file extension not supported, skipping");
        return Ok(());
    }
    let path = ctx.workspace.resolve(&request.filename)?;
    info!(filename = %request.filename, "running file");

    let mut cmd = Command::new(&ctx.run.command[0]);
    cmd.args(&ctx.run.command[1..]).arg(&path);
    let output = run_command_with_timeout(
        cmd,
        Duration::from_secs(ctx.run.timeout_secs),
        ctx.run.output_limit_bytes,
    )?;

    if output.timed_out {
        warn!(filename = %request.filename, timeout_secs = ctx.run.timeout_secs, "script timed out");
        memory.record_terminal(&format!(
            " {} timed out after {} seconds and was killed, the objective may not be reached",
            request.filename, ctx.run.timeout_secs
        ));
        return Ok(());
    }

    memory.record_terminal(&format!(
        " the output of {} is: {}. ",
        request.filename,
        output.stdout_lossy()
    ));
    let stderr = output.stderr_lossy();
    if stderr.len() > 1 {
        memory.record_terminal(&format!(
            " {} gave out the error: {}",
            request.filename, stderr
        ));
    }
    Ok(())
}

/// Ask the model a question, with the whole task list as context, and load
/// the answer into memory.
fn research(
    ctx: &ExecutionContext<'_>,
    task: &Task,
    task_list: &[Task],
    memory: &mut CycleMemory,
) -> Result<()> {
    let context = join_raw(task_list);
    let prompt = ctx.prompts.research(&task.raw, &context)?;
    let answer = ctx.client.complete(&prompt)?;
    memory.record_read(&format!(
        "this is the answer to the task {} the answer is: {}",
        task.raw, answer
    ));
    Ok(())
}

fn is_text_extension(filename: &str) -> bool {
    filename.ends_with(".txt") || filename.ends_with(".md")
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("fence regex"));

/// Keep only the first fenced segment of a code response, if any.
///
/// Models wrap code in ``` fences (or, for some, ''' quotes); the
/// surrounding prose must not end up in the written file.
fn extract_fenced(response: &str) -> String {
    if let Some(caps) = FENCE_RE.captures(response) {
        return caps[1].to_string();
    }
    if let Some(inner) = response.split("'''").nth(1) {
        return inner.to_string();
    }
    response.to_string()
}
