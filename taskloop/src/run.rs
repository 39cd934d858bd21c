//! Objective lifecycle orchestration: plan, execute, check, interpret, fix.
//!
//! The loop plans once, executes the plan, then alternates verification
//! cycles with fix cycles until the judgment confirms success or the fix
//! budget is spent. Each check/fix cycle starts from empty memory; the
//! judgment only ever sees facts produced by the cycle it closes.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::memory::CycleMemory;
use crate::core::task::{Task, join_raw, parse_tasks};
use crate::core::verdict::{Verdict, classify_verdict};
use crate::execute::{ExecutionContext, TaskOutcome, execute_task};

/// Which planning phase produced a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Check,
    Fix,
}

/// Progress notifications for the caller's narration.
#[derive(Debug)]
pub enum RunEvent<'a> {
    Planned { phase: Phase, tasks: &'a [Task] },
    Executed { task: &'a Task, outcome: &'a TaskOutcome },
    Judged { verdict: &'a Verdict },
}

/// Reason why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// The judgment confirmed the objective.
    Achieved,
    /// The fix budget was spent without a confirmed success.
    GaveUp { cycles: u32, last_reason: String },
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stop: RunStop,
    /// Fix cycles actually performed.
    pub fix_cycles: u32,
}

/// Run the full lifecycle for one objective.
///
/// `max_fix_cycles` bounds how many times the loop may attempt remediation
/// after a failed (or ambiguous) judgment before giving up.
#[instrument(skip_all, fields(max_fix_cycles))]
pub fn run_objective<F: FnMut(RunEvent<'_>)>(
    ctx: &ExecutionContext<'_>,
    objective: &str,
    max_fix_cycles: u32,
    mut on_event: F,
) -> Result<RunOutcome> {
    let plan_prompt = ctx.prompts.plan(objective)?;
    let response = ctx.client.complete(&plan_prompt).context("request plan")?;
    let main_list = parse_tasks(&response);
    if main_list.is_empty() {
        warn!("plan response contained no parseable tasks");
    }
    on_event(RunEvent::Planned {
        phase: Phase::Plan,
        tasks: &main_list,
    });

    let mut memory = CycleMemory::new();
    execute_all(ctx, &main_list, &mut memory, &mut on_event);

    // The check prompt describes whichever list ran last: the plan on the
    // first pass, the fix list on later passes.
    let mut context_list = main_list;
    let mut cycles = 0u32;
    loop {
        memory.reset();
        let check_prompt = ctx.prompts.check(objective, &join_raw(&context_list))?;
        let check_response = ctx
            .client
            .complete(&check_prompt)
            .context("request verification plan")?;
        let check_list = parse_tasks(&check_response);
        on_event(RunEvent::Planned {
            phase: Phase::Check,
            tasks: &check_list,
        });
        execute_all(ctx, &check_list, &mut memory, &mut on_event);

        let interpret_prompt = ctx.prompts.interpret(objective, &memory.combined())?;
        let judgment = ctx
            .client
            .complete(&interpret_prompt)
            .context("request judgment")?;
        let verdict = classify_verdict(&judgment);
        on_event(RunEvent::Judged { verdict: &verdict });

        let Some(reason) = verdict.fix_reason() else {
            info!(fix_cycles = cycles, "objective confirmed");
            return Ok(RunOutcome {
                stop: RunStop::Achieved,
                fix_cycles: cycles,
            });
        };
        if cycles >= max_fix_cycles {
            warn!(fix_cycles = cycles, "fix budget spent, giving up");
            return Ok(RunOutcome {
                stop: RunStop::GaveUp {
                    cycles,
                    last_reason: reason.to_string(),
                },
                fix_cycles: cycles,
            });
        }
        let reason = reason.to_string();
        cycles += 1;

        memory.reset();
        let fix_prompt = ctx.prompts.fix(objective, &reason)?;
        let fix_response = ctx
            .client
            .complete(&fix_prompt)
            .context("request fix plan")?;
        let fix_list = parse_tasks(&fix_response);
        on_event(RunEvent::Planned {
            phase: Phase::Fix,
            tasks: &fix_list,
        });
        execute_all(ctx, &fix_list, &mut memory, &mut on_event);
        context_list = fix_list;
    }
}

/// Dispatch every task in list order, announcing each outcome.
fn execute_all<F: FnMut(RunEvent<'_>)>(
    ctx: &ExecutionContext<'_>,
    tasks: &[Task],
    memory: &mut CycleMemory,
    on_event: &mut F,
) {
    for task in tasks {
        let outcome = execute_task(ctx, task, tasks, memory);
        on_event(RunEvent::Executed {
            task,
            outcome: &outcome,
        });
    }
}
