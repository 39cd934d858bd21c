//! Objective-driven task loop agent CLI.
//!
//! `taskloop run` plans an objective into actions, executes them against
//! the workspace, and loops through verification and fix cycles until the
//! model confirms success or the fix budget is spent.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use taskloop::core::verdict::Verdict;
use taskloop::execute::{ExecutionContext, TaskOutcome};
use taskloop::exit_codes;
use taskloop::io::completion::client_from_config;
use taskloop::io::config::{AgentConfig, load_config, write_config};
use taskloop::io::prompt::PromptEngine;
use taskloop::io::workspace::Workspace;
use taskloop::run::{Phase, RunEvent, RunStop, run_objective};

const API_KEY_ENV: &str = "TASKLOOP_API_KEY";

#[derive(Parser)]
#[command(name = "taskloop", version, about = "Objective-driven task loop agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop against an objective until confirmed or out of fix cycles.
    Run {
        /// Objective to accomplish; falls back to the config file.
        #[arg(short, long)]
        objective: Option<String>,
        /// Path to the agent config file.
        #[arg(short, long, default_value = "taskloop.toml")]
        config: PathBuf,
    },
    /// Write a default config file.
    Init {
        /// Path to write the config file to.
        #[arg(short, long, default_value = "taskloop.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    taskloop::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { objective, config } => cmd_run(objective, &config),
        Command::Init { config, force } => {
            cmd_init(&config, force)?;
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &AgentConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_run(objective: Option<String>, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let objective = match objective {
        Some(objective) if !objective.trim().is_empty() => objective,
        _ => cfg.objective.clone(),
    };
    if objective.trim().is_empty() {
        bail!("no objective: pass --objective or set it in {}", config_path.display());
    }

    let api_key = std::env::var(API_KEY_ENV).ok();
    let client = client_from_config(&cfg, api_key)?;
    let workspace = Workspace::new(&cfg.workspace_dir);
    workspace.ensure_exists()?;
    let prompts = PromptEngine::new();
    let ctx = ExecutionContext {
        client: client.as_ref(),
        workspace: &workspace,
        prompts: &prompts,
        run: &cfg.run,
    };

    println!("\n***** OBJECTIVE *****\n");
    println!("{objective}");

    let outcome = run_objective(&ctx, &objective, cfg.max_fix_cycles, narrate)?;

    match outcome.stop {
        RunStop::Achieved => {
            println!("\n***** SHUTDOWN *****\n");
            Ok(exit_codes::OK)
        }
        RunStop::GaveUp { cycles, last_reason } => {
            println!("\n***** GAVE UP after {cycles} fix cycles *****\n");
            println!("{last_reason}");
            Ok(exit_codes::GAVE_UP)
        }
    }
}

/// Human-readable progress narration on stdout.
fn narrate(event: RunEvent<'_>) {
    match event {
        RunEvent::Planned { phase, tasks } => {
            let banner = match phase {
                Phase::Plan => "Generated Tasks",
                Phase::Check => "Tasks For Checking Objective Completion",
                Phase::Fix => "Fixing The Problems Through Tasks",
            };
            println!("\n***** {banner} *****\n");
            for task in tasks {
                println!("{}", task.raw.trim());
            }
        }
        RunEvent::Executed { task, outcome } => match outcome {
            TaskOutcome::Completed { action } => println!("- {action}: task {} done", task.id),
            TaskOutcome::Skipped { error } => println!("- task {} skipped: {error}", task.id),
            TaskOutcome::Failed { action, error } => {
                println!("- {action}: task {} failed: {error}", task.id);
            }
        },
        RunEvent::Judged { verdict } => match verdict {
            Verdict::Achieved => println!("\nWas the objective completed? yes"),
            Verdict::NotAchieved { reason } => {
                println!("\nWas the objective completed? {reason}");
            }
            Verdict::Ambiguous { response } => {
                println!("\nWas the objective completed? unclear: {response}");
            }
        },
    }
}
